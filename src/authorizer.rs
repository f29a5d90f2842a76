//! Attaches bearer tokens to requests bound for the API origin.
//!
//! DESIGN
//! ======
//! Every attempt first awaits the auth gate so no request races the
//! provider's startup. After that the live current user decides whether a
//! token is fetched at all.
//!
//! ERROR HANDLING
//! ==============
//! A rejected gate always propagates. Token failures are swallowed in
//! [`TokenMode::Cached`] (the request goes out unauthenticated) and
//! propagated in [`TokenMode::ForceRefresh`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::gate::AuthGate;
use crate::provider::CredentialProvider;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// Reuse the provider's cached token if it has one.
    Cached,
    /// Mint a new token.
    ForceRefresh,
}

impl TokenMode {
    fn force_refresh(self) -> bool {
        matches!(self, Self::ForceRefresh)
    }
}

pub struct RequestAuthorizer {
    config: Arc<ShellConfig>,
    gate: Arc<AuthGate>,
    provider: Arc<dyn CredentialProvider>,
}

impl RequestAuthorizer {
    #[must_use]
    pub fn new(config: Arc<ShellConfig>, gate: Arc<AuthGate>, provider: Arc<dyn CredentialProvider>) -> Self {
        Self { config, gate, provider }
    }

    /// Attach `Authorization: Bearer <token>` when `request` targets the API
    /// origin and a user is signed in. Returns whether a header was attached.
    ///
    /// # Errors
    ///
    /// - [`ShellError::AuthStateRejected`] if the gate was rejected.
    /// - [`ShellError::Token`] if a forced refresh fails.
    /// - [`ShellError::InvalidRequest`] if the token is not a valid header value.
    pub async fn attach_auth_header(&self, request: &mut ApiRequest, mode: TokenMode) -> Result<bool, ShellError> {
        self.gate.wait().await.map_err(ShellError::AuthStateRejected)?;

        if !self.config.is_api_url(&request.url) {
            return Ok(false);
        }
        if !self.provider.current_user().is_signed_in() {
            debug!(url = %request.url, "no signed-in user; sending without token");
            return Ok(false);
        }

        match self.provider.get_token(mode.force_refresh()).await {
            Ok(token) => {
                request.set_bearer(&token)?;
                Ok(true)
            }
            Err(e) if mode == TokenMode::Cached => {
                warn!(error = %e, url = %request.url, "token fetch failed; sending without token");
                Ok(false)
            }
            Err(e) => Err(ShellError::Token(e)),
        }
    }
}

#[cfg(test)]
#[path = "authorizer_test.rs"]
mod tests;
