//! Request-sending seam and its reqwest-backed implementation.
//!
//! The interceptor decorates a [`RequestSender`]; tests substitute a
//! scripted sender, production uses [`HttpSender`].

use std::time::Duration;

use crate::config::HttpTimeouts;
use crate::error::ShellError;
use crate::request::{ApiRequest, ApiResponse};

#[async_trait::async_trait]
pub trait RequestSender: Send + Sync {
    /// Send one request and return the response, whatever its status.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShellError>;
}

// =============================================================================
// HTTP SENDER
// =============================================================================

pub struct HttpSender {
    http: reqwest::Client,
}

impl HttpSender {
    /// Build a sender with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::HttpClientBuild`] if the TLS backend cannot be
    /// initialized.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, ShellError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ShellError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }

    #[must_use]
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl RequestSender for HttpSender {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShellError> {
        let ApiRequest { method, url, headers, body } = request;
        let transport = |e: reqwest::Error| ShellError::Transport { url: url.clone(), message: e.to_string() };

        let mut builder = self.http.request(method, &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport)?;

        Ok(ApiResponse { status, headers, body: body.to_vec() })
    }
}

#[cfg(test)]
#[path = "sender_test.rs"]
mod tests;
