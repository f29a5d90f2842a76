//! Shell configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Consumed read-only by every component. The API origin match is a plain
//! string prefix test against `base_url`, and sign-in page detection is a
//! substring test against the current path.

use std::time::Duration;

pub const DEFAULT_SIGN_IN_PAGE: &str = "auth.html";
pub const DEFAULT_AUTH_CACHE_TTL_MS: u64 = 120_000;
pub const DEFAULT_GUARD_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_REDIRECT_DELAY_MS: u64 = 300;
pub const DEFAULT_OVERLAY_FADE_MS: u64 = 300;
pub const DEFAULT_UNAUTH_REDIRECT_DELAY_MS: u64 = 500;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// A required environment variable is not set.
    #[error("missing required config: env var {var} not set")]
    MissingVar { var: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_HTTP_TIMEOUT_SECS, connect_secs: DEFAULT_HTTP_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// When false, every page renders and no redirect is ever issued.
    pub auth_enabled: bool,
    /// API origin prefix. Blank disables request interception.
    pub base_url: String,
    /// Sign-in page identifier, matched as a substring of the current path.
    pub sign_in_page: String,
    /// Pages auto-protection skips entirely.
    pub skip_pages: Vec<String>,
    /// How long a cached auth snapshot counts as fresh.
    pub freshness_window: Duration,
    /// How long the page guard waits for the first provider event.
    pub guard_timeout: Duration,
    /// Delay between the unauthorized notice and the sign-in redirect.
    pub redirect_delay: Duration,
    /// Delay between an overlay fade starting and its removal.
    pub overlay_fade: Duration,
    /// Delay before navigating when a page guard decides to redirect.
    pub unauth_redirect_delay: Duration,
    pub http: HttpTimeouts,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            auth_enabled: true,
            base_url: String::new(),
            sign_in_page: DEFAULT_SIGN_IN_PAGE.to_owned(),
            skip_pages: vec![DEFAULT_SIGN_IN_PAGE.to_owned()],
            freshness_window: Duration::from_millis(DEFAULT_AUTH_CACHE_TTL_MS),
            guard_timeout: Duration::from_millis(DEFAULT_GUARD_TIMEOUT_MS),
            redirect_delay: Duration::from_millis(DEFAULT_REDIRECT_DELAY_MS),
            overlay_fade: Duration::from_millis(DEFAULT_OVERLAY_FADE_MS),
            unauth_redirect_delay: Duration::from_millis(DEFAULT_UNAUTH_REDIRECT_DELAY_MS),
            http: HttpTimeouts::default(),
        }
    }
}

impl ShellConfig {
    /// Build typed shell config from environment variables.
    ///
    /// Optional:
    /// - `SHELL_AUTH_ENABLED`: `true` (default) / `false` / `1` / `0`
    /// - `SHELL_BASE_URL`: API origin prefix; blank disables interception
    /// - `SHELL_SIGN_IN_PAGE`: default `auth.html`
    /// - `SHELL_SKIP_PAGES`: comma list, default `auth.html`
    /// - `SHELL_AUTH_CACHE_TTL_MS`: default 120000
    /// - `SHELL_GUARD_TIMEOUT_MS`: default 8000
    /// - `SHELL_REDIRECT_DELAY_MS`: default 300
    /// - `SHELL_OVERLAY_FADE_MS`: default 300
    /// - `SHELL_UNAUTH_REDIRECT_DELAY_MS`: default 500
    /// - `SHELL_HTTP_TIMEOUT_SECS`: default 30
    /// - `SHELL_HTTP_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigParse`] when `SHELL_AUTH_ENABLED` is not a
    /// recognizable boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_enabled = parse_bool(std::env::var("SHELL_AUTH_ENABLED").ok().as_deref(), true)?;
        let base_url = std::env::var("SHELL_BASE_URL").unwrap_or_default().trim().to_owned();
        let sign_in_page = std::env::var("SHELL_SIGN_IN_PAGE")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SIGN_IN_PAGE.to_owned());
        let skip_pages = std::env::var("SHELL_SKIP_PAGES")
            .ok()
            .map(|v| parse_list(&v))
            .filter(|pages| !pages.is_empty())
            .unwrap_or_else(|| vec![sign_in_page.clone()]);

        Ok(Self {
            auth_enabled,
            base_url,
            sign_in_page,
            skip_pages,
            freshness_window: env_millis("SHELL_AUTH_CACHE_TTL_MS", DEFAULT_AUTH_CACHE_TTL_MS),
            guard_timeout: env_millis("SHELL_GUARD_TIMEOUT_MS", DEFAULT_GUARD_TIMEOUT_MS),
            redirect_delay: env_millis("SHELL_REDIRECT_DELAY_MS", DEFAULT_REDIRECT_DELAY_MS),
            overlay_fade: env_millis("SHELL_OVERLAY_FADE_MS", DEFAULT_OVERLAY_FADE_MS),
            unauth_redirect_delay: env_millis("SHELL_UNAUTH_REDIRECT_DELAY_MS", DEFAULT_UNAUTH_REDIRECT_DELAY_MS),
            http: HttpTimeouts {
                request_secs: env_parse("SHELL_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
                connect_secs: env_parse("SHELL_HTTP_CONNECT_TIMEOUT_SECS", DEFAULT_HTTP_CONNECT_TIMEOUT_SECS),
            },
        })
    }

    /// Whether requests should be routed through the auth interceptor at all.
    #[must_use]
    pub fn interceptor_enabled(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    /// Whether `url` targets the configured API origin.
    #[must_use]
    pub fn is_api_url(&self, url: &str) -> bool {
        self.interceptor_enabled() && url.starts_with(&self.base_url)
    }

    #[must_use]
    pub fn is_sign_in_page(&self, path: &str) -> bool {
        path.contains(&self.sign_in_page)
    }

    /// Whether auto-protection should leave `path` alone.
    #[must_use]
    pub fn is_skipped_page(&self, path: &str) -> bool {
        self.skip_pages.iter().any(|page| path.contains(page.as_str()))
    }

    /// Redirect target for the sign-in entry point.
    #[must_use]
    pub fn sign_in_target(&self) -> &str {
        &self.sign_in_page
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_parse(key, default))
}

fn parse_bool(raw: Option<&str>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::ConfigParse(format!("invalid SHELL_AUTH_ENABLED: {other}"))),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
