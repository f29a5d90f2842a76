//! Error taxonomy for the auth shell.
//!
//! ERROR HANDLING
//! ==============
//! Every variant carries a stable `E_*` code through [`ErrorCode`] so call
//! sites can branch without matching on message text. Only transport
//! failures are retryable; an auth failure after the single forced retry is
//! final.

use crate::provider::ProviderError;

/// Stable machine-readable error classification.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    /// The auth gate settled with a critical provider error.
    #[error("auth state rejected: {0}")]
    AuthStateRejected(ProviderError),

    /// A forced token refresh failed.
    #[error("token refresh failed: {0}")]
    Token(ProviderError),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Still 401 after the forced-refresh retry.
    #[error("unauthorized API request (retry failed): {url}")]
    UnauthorizedAfterRetry { url: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
}

impl ShellError {
    /// Whether this is the terminal double-401 failure.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::UnauthorizedAfterRetry { .. })
    }
}

impl ErrorCode for ShellError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AuthStateRejected(_) => "E_AUTH_STATE_REJECTED",
            Self::Token(_) => "E_TOKEN_REFRESH",
            Self::Transport { .. } => "E_TRANSPORT",
            Self::UnauthorizedAfterRetry { .. } => "E_UNAUTHORIZED",
            Self::InvalidRequest(_) => "E_INVALID_REQUEST",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
