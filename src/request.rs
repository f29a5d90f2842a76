//! In-flight request and response values passed through the interceptor.
//!
//! DESIGN
//! ======
//! `ApiRequest` is owned by a single send attempt. Callers hand the
//! interceptor a [`RequestInput`] (bare URL or a prepared request) plus an
//! optional [`RequestInit`]; [`normalize`] folds both into one request with
//! merged headers. Init headers override same-named input headers; all other
//! input headers are preserved.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ShellError;

// =============================================================================
// REQUEST
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: HeaderMap::new(), body: None }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a single header, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidRequest`] for an illegal name or value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ShellError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Merge plain name/value pairs, as from a header object literal.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidRequest`] on the first illegal pair.
    pub fn with_headers<'a>(
        mut self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ShellError> {
        for (name, value) in pairs {
            let (name, value) = parse_header(name, value)?;
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    /// Merge an already-typed header map.
    #[must_use]
    pub fn with_header_map(mut self, headers: HeaderMap) -> Self {
        merge_headers(&mut self.headers, headers);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body and set `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidRequest`] if serialization fails.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ShellError> {
        let body = serde_json::to_vec(value).map_err(|e| ShellError::InvalidRequest(e.to_string()))?;
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(body);
        Ok(self)
    }

    /// Set `Authorization: Bearer <token>`. The value is marked sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidRequest`] if the token is not a legal
    /// header value.
    pub fn set_bearer(&mut self, token: &str) -> Result<(), ShellError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ShellError::InvalidRequest("token is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ShellError> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| ShellError::InvalidRequest(format!("invalid header name: {name}")))?;
    let header_value = HeaderValue::from_str(value.trim())
        .map_err(|_| ShellError::InvalidRequest(format!("invalid value for header {name}")))?;
    Ok((header_name, header_value))
}

/// Per-key override: every name present in `overrides` replaces all of its
/// values in `base`.
fn merge_headers(base: &mut HeaderMap, overrides: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in overrides {
        match name {
            Some(name) => {
                base.insert(name.clone(), value);
                current = Some(name);
            }
            None => {
                if let Some(name) = &current {
                    base.append(name.clone(), value);
                }
            }
        }
    }
}

// =============================================================================
// INPUT NORMALIZATION
// =============================================================================

/// What a caller hands to `fetch`.
#[derive(Debug, Clone)]
pub enum RequestInput {
    Url(String),
    Request(ApiRequest),
}

impl From<&str> for RequestInput {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for RequestInput {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<reqwest::Url> for RequestInput {
    fn from(url: reqwest::Url) -> Self {
        Self::Url(url.into())
    }
}

impl From<ApiRequest> for RequestInput {
    fn from(request: ApiRequest) -> Self {
        Self::Request(request)
    }
}

/// Caller-supplied options layered on top of the input.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Fold `input` and `init` into one concrete request.
#[must_use]
pub fn normalize(input: RequestInput, init: RequestInit) -> ApiRequest {
    let mut request = match input {
        RequestInput::Url(url) => ApiRequest::get(url),
        RequestInput::Request(request) => request,
    };
    if let Some(method) = init.method {
        request.method = method;
    }
    if init.body.is_some() {
        request.body = init.body;
    }
    merge_headers(&mut request.headers, init.headers);
    request
}

// =============================================================================
// RESPONSE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decode error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
