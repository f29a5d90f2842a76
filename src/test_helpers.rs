//! Fakes shared by unit tests across modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::provider::{
    AuthEvent, AuthListener, CredentialProvider, CurrentUser, ListenerSet, NO_CURRENT_USER, ProviderError,
    Subscription, User,
};
use crate::request::{ApiRequest, ApiResponse};
use crate::sender::RequestSender;
use crate::ui::{LoadingOverlay, NoticeLevel, Notifier};

pub const API_BASE: &str = "https://api.x";

/// Config with interception enabled for [`API_BASE`].
pub fn test_config() -> ShellConfig {
    ShellConfig { base_url: API_BASE.to_owned(), ..ShellConfig::default() }
}

// =============================================================================
// PROVIDER
// =============================================================================

/// In-memory provider. Replays its current state to new subscribers.
#[derive(Default)]
pub struct FakeProvider {
    listeners: Arc<ListenerSet>,
    current: Mutex<CurrentUser>,
    token_results: Mutex<VecDeque<Result<String, ProviderError>>>,
    token_calls: Mutex<Vec<bool>>,
    subscribe_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(uid: &str) -> Arc<Self> {
        let provider = Self::new();
        provider.set_current(CurrentUser::SignedIn(User::new(uid)));
        provider
    }

    pub fn set_current(&self, current: CurrentUser) {
        *self.current.lock().unwrap() = current;
    }

    /// Change the current user and notify every listener.
    pub fn emit_user(&self, user: Option<User>) {
        self.set_current(CurrentUser::from(user.clone()));
        self.listeners.emit(&AuthEvent::Changed(user));
    }

    pub fn emit_error(&self, err: ProviderError) {
        self.listeners.emit(&AuthEvent::Failed(err));
    }

    /// Queue the outcome of the next `get_token` call.
    pub fn push_token(&self, result: Result<String, ProviderError>) {
        self.token_results.lock().unwrap().push_back(result);
    }

    /// `force_refresh` flag of every `get_token` call so far.
    pub fn token_calls(&self) -> Vec<bool> {
        self.token_calls.lock().unwrap().clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait::async_trait]
impl CredentialProvider for FakeProvider {
    fn subscribe(&self, listener: AuthListener) -> Subscription {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.listeners.subscribe(listener, || self.current_user().as_event())
    }

    fn current_user(&self) -> CurrentUser {
        self.current.lock().unwrap().clone()
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String, ProviderError> {
        self.token_calls.lock().unwrap().push(force_refresh);
        if let Some(result) = self.token_results.lock().unwrap().pop_front() {
            return result;
        }
        if !self.current_user().is_signed_in() {
            return Err(ProviderError::new(NO_CURRENT_USER, "no user"));
        }
        Ok(if force_refresh { "fresh-token".to_owned() } else { "cached-token".to_owned() })
    }
}

// =============================================================================
// SENDER
// =============================================================================

/// Sender that answers from a script and records every request it sees.
/// Answers 200 once the script runs out.
#[derive(Default)]
pub struct ScriptedSender {
    script: Mutex<VecDeque<Result<StatusCode, ShellError>>>,
    sent: Mutex<Vec<ApiRequest>>,
}

impl ScriptedSender {
    pub fn new(statuses: impl IntoIterator<Item = StatusCode>) -> Arc<Self> {
        let script = statuses.into_iter().map(Ok).collect();
        Arc::new(Self { script: Mutex::new(script), sent: Mutex::new(Vec::new()) })
    }

    pub fn always_ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_error(&self, err: ShellError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RequestSender for ScriptedSender {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShellError> {
        self.sent.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(StatusCode::OK));
        next.map(|status| ApiResponse::new(status, status.as_str()))
    }
}

// =============================================================================
// UI
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(String, NoticeLevel)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(String, NoticeLevel)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        self.notices.lock().unwrap().push((message.to_owned(), level));
    }
}

/// Overlay recording `show:`, `title:`, `update:`, `fade`, `remove` events in order.
#[derive(Default)]
pub struct RecordingOverlay {
    active: Mutex<bool>,
    events: Mutex<Vec<String>>,
}

impl RecordingOverlay {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl LoadingOverlay for RecordingOverlay {
    fn show(&self, message: &str) {
        *self.active.lock().unwrap() = true;
        self.record(format!("show:{message}"));
    }

    fn set_title(&self, title: &str) {
        self.record(format!("title:{title}"));
    }

    fn update_message(&self, message: &str) {
        self.record(format!("update:{message}"));
    }

    fn is_active(&self) -> bool {
        *self.active.lock().unwrap()
    }

    fn begin_fade(&self) {
        self.record("fade".to_owned());
    }

    fn remove(&self) {
        *self.active.lock().unwrap() = false;
        self.record("remove".to_owned());
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Scripted reply served by [`serve_http`].
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: String,
}

impl CannedResponse {
    pub fn new(status: StatusCode, body: &str) -> Self {
        Self { status, headers: Vec::new(), body: body.to_owned() }
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl IntoResponse for CannedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        for (name, value) in self.headers {
            response
                .headers_mut()
                .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        response
    }
}

/// JSON reply with `content-type: application/json`.
pub fn json_response(status: StatusCode, body: &str) -> CannedResponse {
    CannedResponse::new(status, body).with_header("content-type", "application/json")
}

/// A request as the test server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

struct CannedServer {
    responses: Mutex<VecDeque<CannedResponse>>,
    recorded: mpsc::UnboundedSender<RecordedRequest>,
}

async fn answer(
    State(server): State<Arc<CannedServer>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path_and_query = uri.path_and_query().map_or_else(|| uri.path().to_owned(), ToString::to_string);
    let _ = server.recorded.send(RecordedRequest {
        method,
        path_and_query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    let next = server.responses.lock().unwrap().pop_front();
    match next {
        Some(canned) => canned.into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no scripted response").into_response(),
    }
}

/// Serve `responses` in order on a loopback port. The handle yields one
/// recorded request per scripted response, in arrival order.
pub async fn serve_http(responses: Vec<CannedResponse>) -> (String, JoinHandle<Vec<RecordedRequest>>) {
    let expected = responses.len();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let state = Arc::new(CannedServer { responses: Mutex::new(responses.into()), recorded: tx });
    let app = Router::new().fallback(answer).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let handle = tokio::spawn(async move {
        let mut requests = Vec::with_capacity(expected);
        while requests.len() < expected {
            let Some(request) = rx.recv().await else { break };
            requests.push(request);
        }
        requests
    });
    (format!("http://{addr}"), handle)
}
