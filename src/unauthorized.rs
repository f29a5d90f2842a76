//! Forced sign-out: clear credentials and send the user to sign in.
//!
//! Every step is an idempotent removal or a fire-and-forget UI effect. The
//! redirect is deferred by `redirect_delay` so the notice is visible first.
//!
//! One sign-out, one notice: the handler fires once and then stays quiet
//! until [`UnauthorizedHandler::rearm`] is called on the next signed-in
//! event. A rejected refresh token reaches the handler both through the
//! provider's sign-out event and through the failing request, and several
//! requests can hit 401 at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::cache::AuthStateCache;
use crate::config::ShellConfig;
use crate::storage::{KeyValueStore, REFRESH_TOKEN_KEY};
use crate::ui::{LoadingOverlay, Navigator, NoticeLevel, Notifier, dismiss_overlay, spawn_after};

pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Redirecting…";

pub struct UnauthorizedHandler {
    store: Arc<dyn KeyValueStore>,
    cache: Arc<AuthStateCache>,
    overlay: Arc<dyn LoadingOverlay>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: Arc<ShellConfig>,
    armed: AtomicBool,
}

impl UnauthorizedHandler {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cache: Arc<AuthStateCache>,
        overlay: Arc<dyn LoadingOverlay>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        config: Arc<ShellConfig>,
    ) -> Self {
        Self { store, cache, overlay, notifier, navigator, config, armed: AtomicBool::new(true) }
    }

    /// Run the forced sign-out. Returns false when a sign-out already ran
    /// since the last [`Self::rearm`].
    pub fn handle(&self) -> bool {
        if !self.armed.swap(false, Ordering::AcqRel) {
            debug!("sign-out already in progress, skipping");
            return false;
        }
        warn!("unauthorized; clearing credentials and redirecting to sign-in");
        self.store.remove(REFRESH_TOKEN_KEY);
        self.cache.clear();
        dismiss_overlay(&self.overlay, self.config.overlay_fade);
        self.notifier.notify(SESSION_EXPIRED_NOTICE, NoticeLevel::Error);

        let navigator = Arc::clone(&self.navigator);
        let target = self.config.sign_in_target().to_owned();
        spawn_after(self.config.redirect_delay, move || navigator.navigate(&target));
        true
    }

    /// Allow the next `handle` call to run again.
    pub fn rearm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "unauthorized_test.rs"]
mod tests;
