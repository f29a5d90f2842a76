//! Credential provider backed by a secure-token refresh endpoint.
//!
//! SYSTEM CONTEXT
//! ==============
//! The long-lived refresh token lives in the key/value store under
//! `refreshToken`. Short-lived ID tokens are minted by POSTing
//! `grant_type=refresh_token` to the token endpoint and cached in memory
//! until shortly before they expire.
//!
//! TRADE-OFFS
//! ==========
//! Refreshes are single-flight: concurrent callers queue on one async lock
//! and re-check the cache after acquiring it, so a burst of requests costs
//! one exchange. Forced refreshes always exchange.
//!
//! ERROR HANDLING
//! ==============
//! Failures map onto `auth/*` codes. Transport failures and 5xx are
//! critical; any other rejection invalidates the stored session.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    AuthEvent, AuthListener, CredentialProvider, CurrentUser, INTERNAL_ERROR, ListenerSet, NETWORK_REQUEST_FAILED,
    NO_CURRENT_USER, ProviderError, Subscription, User,
};
use crate::cache::now_ms;
use crate::config::{ConfigError, HttpTimeouts};
use crate::error::ShellError;
use crate::storage::{KeyValueStore, REFRESH_TOKEN_KEY};

pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";
/// Cached ID tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_MS: u64 = 300_000;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEndpointConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl TokenEndpointConfig {
    /// Required: `SHELL_PROVIDER_API_KEY`.
    /// Optional: `SHELL_TOKEN_ENDPOINT` (default securetoken).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when the API key is unset or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("SHELL_PROVIDER_API_KEY")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingVar { var: "SHELL_PROVIDER_API_KEY".into() })?;
        let endpoint = std::env::var("SHELL_TOKEN_ENDPOINT")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_owned());
        Ok(Self { endpoint, api_key })
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

pub struct RefreshTokenProvider {
    http: reqwest::Client,
    endpoint: TokenEndpointConfig,
    store: Arc<dyn KeyValueStore>,
    listeners: Arc<ListenerSet>,
    state: Mutex<SessionState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct SessionState {
    current: CurrentUser,
    token: Option<CachedToken>,
}

struct CachedToken {
    id_token: String,
    expires_at_ms: u64,
}

impl CachedToken {
    fn usable_at(&self, now_ms: u64) -> bool {
        self.expires_at_ms.saturating_sub(EXPIRY_SKEW_MS) > now_ms
    }
}

impl RefreshTokenProvider {
    /// # Errors
    ///
    /// Returns [`ShellError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: TokenEndpointConfig,
        store: Arc<dyn KeyValueStore>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, ShellError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ShellError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            store,
            listeners: ListenerSet::shared(),
            state: Mutex::new(SessionState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Resolve the initial auth state from the stored refresh token and
    /// notify listeners.
    pub async fn start(&self) {
        if self.store.get(REFRESH_TOKEN_KEY).is_none() {
            debug!("no stored refresh token");
            self.set_current(CurrentUser::SignedOut);
            self.listeners.emit(&AuthEvent::Changed(None));
            return;
        }

        let _flight = self.refresh_lock.lock().await;
        match self.exchange().await {
            Ok((user, _)) => {
                info!(uid = %user.uid, "session restored");
                self.listeners.emit(&AuthEvent::Changed(Some(user)));
            }
            Err(e) => {
                if !e.is_critical() {
                    self.invalidate_session();
                }
                warn!(error = %e, "session restore failed");
                self.listeners.emit(&AuthEvent::Failed(e));
            }
        }
    }

    /// Store `refresh_token` and exchange it for a session.
    ///
    /// # Errors
    ///
    /// Returns the classified exchange failure; the token is not kept.
    pub async fn sign_in_with_refresh_token(&self, refresh_token: &str) -> Result<User, ProviderError> {
        let _flight = self.refresh_lock.lock().await;
        self.store.set(REFRESH_TOKEN_KEY, refresh_token.trim());
        match self.exchange().await {
            Ok((user, _)) => {
                info!(uid = %user.uid, "signed in");
                self.listeners.emit(&AuthEvent::Changed(Some(user.clone())));
                Ok(user)
            }
            Err(e) => {
                self.invalidate_session();
                Err(e)
            }
        }
    }

    pub fn sign_out(&self) {
        self.invalidate_session();
        info!("signed out");
        self.listeners.emit(&AuthEvent::Changed(None));
    }

    /// POST the stored refresh token and record the resulting session.
    async fn exchange(&self) -> Result<(User, String), ProviderError> {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)
            .ok_or_else(|| ProviderError::new(NO_CURRENT_USER, "no stored refresh token"))?;

        let response = self
            .http
            .post(&self.endpoint.endpoint)
            .query(&[("key", self.endpoint.api_key.as_str())])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::new(NETWORK_REQUEST_FAILED, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::new(NETWORK_REQUEST_FAILED, e.to_string()))?;
        if status != 200 {
            return Err(classify_token_failure(status, &body));
        }

        let grant = parse_grant(&body, now_ms())?;
        if grant.refresh_token != refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, &grant.refresh_token);
        }
        let user = User::new(grant.user_id);
        let id_token = grant.id_token;
        {
            let mut state = self.lock_state();
            state.current = CurrentUser::SignedIn(user.clone());
            state.token = Some(CachedToken { id_token: id_token.clone(), expires_at_ms: grant.expires_at_ms });
        }
        Ok((user, id_token))
    }

    /// Drop the stored session. Returns whether a user had been signed in.
    fn invalidate_session(&self) -> bool {
        self.store.remove(REFRESH_TOKEN_KEY);
        let mut state = self.lock_state();
        state.token = None;
        let was_signed_in = state.current.is_signed_in();
        state.current = CurrentUser::SignedOut;
        was_signed_in
    }

    fn set_current(&self, current: CurrentUser) {
        self.lock_state().current = current;
    }

    fn cached_token(&self, now_ms: u64) -> Option<String> {
        let state = self.lock_state();
        state
            .token
            .as_ref()
            .filter(|token| token.usable_at(now_ms))
            .map(|token| token.id_token.clone())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl CredentialProvider for RefreshTokenProvider {
    fn subscribe(&self, listener: AuthListener) -> Subscription {
        self.listeners.subscribe(listener, || self.current_user().as_event())
    }

    fn current_user(&self) -> CurrentUser {
        self.lock_state().current.clone()
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String, ProviderError> {
        if !self.current_user().is_signed_in() {
            return Err(ProviderError::new(NO_CURRENT_USER, "no signed-in user"));
        }
        if !force_refresh {
            if let Some(token) = self.cached_token(now_ms()) {
                return Ok(token);
            }
        }

        let _flight = self.refresh_lock.lock().await;
        if !force_refresh {
            // Another caller may have refreshed while we queued.
            if let Some(token) = self.cached_token(now_ms()) {
                return Ok(token);
            }
        }
        debug!(force_refresh, "exchanging refresh token");
        match self.exchange().await {
            Ok((_, id_token)) => Ok(id_token),
            Err(e) => {
                if !e.is_critical() && self.invalidate_session() {
                    warn!(error = %e, "refresh token rejected; signing out");
                    self.listeners.emit(&AuthEvent::Changed(None));
                }
                Err(e)
            }
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Deserialize)]
struct GrantResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    /// Seconds, sent as a decimal string.
    expires_in: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenGrant {
    id_token: String,
    refresh_token: String,
    user_id: String,
    expires_at_ms: u64,
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_grant(body: &str, now_ms: u64) -> Result<TokenGrant, ProviderError> {
    let grant: GrantResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::new(INTERNAL_ERROR, format!("unexpected token response: {e}")))?;
    let expires_in_secs = grant
        .expires_in
        .trim()
        .parse::<u64>()
        .map_err(|_| ProviderError::new(INTERNAL_ERROR, format!("invalid expires_in: {}", grant.expires_in)))?;
    Ok(TokenGrant {
        id_token: grant.id_token,
        refresh_token: grant.refresh_token,
        user_id: grant.user_id,
        expires_at_ms: now_ms.saturating_add(expires_in_secs.saturating_mul(1_000)),
    })
}

/// Map a non-200 token endpoint response onto an `auth/*` error.
fn classify_token_failure(status: u16, body: &str) -> ProviderError {
    if status >= 500 {
        return ProviderError::new(INTERNAL_ERROR, format!("token endpoint returned {status}"));
    }
    let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) else {
        return ProviderError::new(INTERNAL_ERROR, format!("unparsable token error ({status})"));
    };
    // Messages look like "TOKEN_EXPIRED" or "INVALID_REFRESH_TOKEN : detail".
    let reason = parsed.error.message.split([' ', ':']).next().unwrap_or_default();
    let code = match reason {
        "TOKEN_EXPIRED" => "auth/user-token-expired",
        "INVALID_REFRESH_TOKEN" => "auth/invalid-refresh-token",
        "USER_DISABLED" => "auth/user-disabled",
        "USER_NOT_FOUND" => "auth/user-not-found",
        _ => "auth/invalid-credential",
    };
    ProviderError::new(code, parsed.error.message)
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
