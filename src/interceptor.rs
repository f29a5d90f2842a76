//! Network interceptor: bearer injection with one forced-refresh retry.
//!
//! ARCHITECTURE
//! ============
//! A [`RequestSender`] decorator. Traffic outside the API origin goes
//! straight to the inner sender without touching the gate or headers.
//! API traffic runs:
//!
//! ```text
//! authorize(cached) -> send -> 401? -> authorize(force) -> send -> 401? -> unauthorized
//! ```
//!
//! Exactly one retry is ever attempted. Each request owns its own
//! `ApiRequest`, so concurrent calls share nothing but the gate.

use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::authorizer::{RequestAuthorizer, TokenMode};
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::request::{ApiRequest, ApiResponse, RequestInit, RequestInput, normalize};
use crate::sender::RequestSender;
use crate::unauthorized::UnauthorizedHandler;

pub struct AuthInterceptor {
    inner: Arc<dyn RequestSender>,
    authorizer: RequestAuthorizer,
    unauthorized: Arc<UnauthorizedHandler>,
    config: Arc<ShellConfig>,
}

impl AuthInterceptor {
    #[must_use]
    pub fn new(
        inner: Arc<dyn RequestSender>,
        authorizer: RequestAuthorizer,
        unauthorized: Arc<UnauthorizedHandler>,
        config: Arc<ShellConfig>,
    ) -> Self {
        Self { inner, authorizer, unauthorized, config }
    }

    /// `fetch`-style entry point: normalize `input` + `init`, then send.
    ///
    /// # Errors
    ///
    /// See [`AuthInterceptor::send`].
    pub async fn fetch(&self, input: impl Into<RequestInput>, init: RequestInit) -> Result<ApiResponse, ShellError> {
        self.send(normalize(input.into(), init)).await
    }

    async fn send_authorized(&self, request: ApiRequest, request_id: Uuid) -> Result<ApiResponse, ShellError> {
        let mut first = request.clone();
        self.authorizer.attach_auth_header(&mut first, TokenMode::Cached).await?;
        let response = self.inner.send(first).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        debug!(%request_id, url = %request.url, "401; retrying with refreshed token");
        let mut retry = request;
        if let Err(e) = self.authorizer.attach_auth_header(&mut retry, TokenMode::ForceRefresh).await {
            if matches!(e, ShellError::Token(_)) {
                self.unauthorized.handle();
            }
            return Err(e);
        }
        let response = self.inner.send(retry.clone()).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        warn!(%request_id, url = %retry.url, "still 401 after token refresh");
        self.unauthorized.handle();
        Err(ShellError::UnauthorizedAfterRetry { url: retry.url })
    }
}

#[async_trait::async_trait]
impl RequestSender for AuthInterceptor {
    /// # Errors
    ///
    /// - [`ShellError::UnauthorizedAfterRetry`] when the retry is also 401.
    /// - [`ShellError::Token`] when the forced refresh fails.
    /// - [`ShellError::AuthStateRejected`] when the gate was rejected.
    /// - Any error from the inner sender.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShellError> {
        if !self.config.is_api_url(&request.url) {
            return self.inner.send(request).await;
        }

        let request_id = Uuid::new_v4();
        let url = request.url.clone();
        let result = self.send_authorized(request, request_id).await;
        if let Err(e) = &result {
            if !e.is_unauthorized() {
                error!(%request_id, %url, error = %e, "API request failed");
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod tests;
