//! Page guard: decide whether a page renders or redirects to sign-in.
//!
//! DESIGN
//! ======
//! Decision order, cheapest first:
//!
//! 1. Auth disabled or already on the sign-in page: render.
//! 2. Fresh positive cache snapshot: render optimistically.
//! 3. Provider already knows the user: branch on it.
//! 4. Otherwise race the gate against `guard_timeout`.
//!
//! Every failure path fails closed. A timeout or rejected gate redirects and
//! never renders.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::AuthStateCache;
use crate::config::ShellConfig;
use crate::gate::AuthGate;
use crate::guard::AuthGuard;
use crate::provider::{CredentialProvider, CurrentUser, User};
use crate::ui::{LoadingOverlay, Navigator, dismiss_overlay, spawn_after};

pub const INITIALIZING_MESSAGE: &str = "Initializing application...";
pub const CHECKING_MESSAGE: &str = "Checking authentication...";
pub const LOADING_PAGE_MESSAGE: &str = "Loading page...";
pub const REDIRECTING_MESSAGE: &str = "Redirecting to login...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardDecision {
    pub render: bool,
    pub redirect: bool,
    /// Redirect target, set only when `redirect` is true.
    pub target: Option<String>,
}

impl GuardDecision {
    #[must_use]
    pub fn render() -> Self {
        Self { render: true, redirect: false, target: None }
    }

    #[must_use]
    pub fn redirect(target: impl Into<String>) -> Self {
        Self { render: false, redirect: true, target: Some(target.into()) }
    }
}

/// Options for [`PageGuard::protect`].
#[derive(Debug, Clone, Default)]
pub struct ProtectOptions {
    pub title: Option<String>,
    /// Replaces the initial overlay message.
    pub message: Option<String>,
    /// Navigate at once instead of showing a redirect message first.
    pub immediate_redirect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page is excluded from protection.
    Skipped,
    Authenticated(Option<User>),
    Redirected(String),
}

pub struct PageGuard {
    config: Arc<ShellConfig>,
    provider: Arc<dyn CredentialProvider>,
    gate: Arc<AuthGate>,
    cache: Arc<AuthStateCache>,
    guard: Arc<AuthGuard>,
    navigator: Arc<dyn Navigator>,
    overlay: Arc<dyn LoadingOverlay>,
}

impl PageGuard {
    #[must_use]
    pub fn new(
        config: Arc<ShellConfig>,
        provider: Arc<dyn CredentialProvider>,
        gate: Arc<AuthGate>,
        cache: Arc<AuthStateCache>,
        guard: Arc<AuthGuard>,
        navigator: Arc<dyn Navigator>,
        overlay: Arc<dyn LoadingOverlay>,
    ) -> Self {
        Self { config, provider, gate, cache, guard, navigator, overlay }
    }

    pub async fn decide(&self, path: &str) -> GuardDecision {
        if !self.config.auth_enabled || self.config.is_sign_in_page(path) {
            return GuardDecision::render();
        }
        if self.cache.read(&self.provider.current_user()) == Some(true) {
            debug!(path, "cached auth state allows render");
            return GuardDecision::render();
        }

        self.guard.initialize();
        let target = self.config.sign_in_target();
        match self.provider.current_user() {
            CurrentUser::SignedIn(_) => return GuardDecision::render(),
            CurrentUser::SignedOut => return GuardDecision::redirect(target),
            CurrentUser::Unknown => {}
        }

        match tokio::time::timeout(self.config.guard_timeout, self.gate.wait()).await {
            Ok(Ok(Some(_))) => GuardDecision::render(),
            Ok(Ok(None)) => GuardDecision::redirect(target),
            Ok(Err(e)) => {
                error!(error = %e, path, "auth check failed");
                GuardDecision::redirect(target)
            }
            Err(_) => {
                warn!(path, timeout = ?self.config.guard_timeout, "auth state determination timed out");
                GuardDecision::redirect(target)
            }
        }
    }

    /// Full page-load protection for the navigator's current path: overlay,
    /// decision, then reveal or redirect. Monitoring stays subscribed after.
    pub async fn protect(&self, options: ProtectOptions) -> PageOutcome {
        let path = self.navigator.current_path();
        if self.config.is_skipped_page(&path) {
            info!(path, "skipping auth protection");
            return PageOutcome::Skipped;
        }

        self.overlay.show(INITIALIZING_MESSAGE);
        if let Some(title) = &options.title {
            self.overlay.set_title(title);
        }
        if let Some(message) = &options.message {
            self.overlay.update_message(message);
        }
        self.overlay.update_message(CHECKING_MESSAGE);

        let decision = self.decide(&path).await;
        let outcome = if decision.redirect {
            let target = decision.target.unwrap_or_else(|| self.config.sign_in_target().to_owned());
            self.redirect(&target, options.immediate_redirect);
            PageOutcome::Redirected(target)
        } else {
            self.overlay.update_message(LOADING_PAGE_MESSAGE);
            dismiss_overlay(&self.overlay, self.config.overlay_fade);
            PageOutcome::Authenticated(self.provider.current_user().user().cloned())
        };

        self.guard.initialize();
        outcome
    }

    fn redirect(&self, target: &str, immediate: bool) {
        if immediate {
            self.navigator.navigate(target);
            return;
        }
        self.overlay.update_message(REDIRECTING_MESSAGE);
        let navigator = Arc::clone(&self.navigator);
        let target = target.to_owned();
        spawn_after(self.config.unauth_redirect_delay, move || navigator.navigate(&target));
    }
}

#[cfg(test)]
#[path = "page_test.rs"]
mod tests;
