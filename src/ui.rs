//! User-facing touch-points: navigation, transient notices, loading overlay.
//!
//! SYSTEM CONTEXT
//! ==============
//! The auth components never render anything themselves. They drive these
//! traits, so a browser front end can implement them against the DOM and
//! the CLI implements them with log lines.
//!
//! Deferred work (overlay removal after a fade, delayed redirects) runs on
//! the ambient tokio runtime and never blocks the caller.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient toast-style notice.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel);
}

pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn navigate(&self, target: &str);
}

/// Full-screen loading overlay shown while the auth decision is pending.
pub trait LoadingOverlay: Send + Sync {
    fn show(&self, message: &str);
    fn set_title(&self, _title: &str) {}
    fn update_message(&self, message: &str);
    fn is_active(&self) -> bool;
    /// Start the fade-out. The overlay stays active until [`Self::remove`].
    fn begin_fade(&self);
    fn remove(&self);
}

// =============================================================================
// LOG-BACKED IMPLEMENTATIONS
// =============================================================================

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Info => info!(notice = message, "notice"),
            NoticeLevel::Warning => warn!(notice = message, "notice"),
            NoticeLevel::Error => error!(notice = message, "notice"),
        }
    }
}

/// Overlay that narrates its lifecycle to the log.
#[derive(Debug, Default)]
pub struct LogOverlay {
    active: Mutex<bool>,
}

impl LoadingOverlay for LogOverlay {
    fn show(&self, message: &str) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = true;
        info!(text = message, "loading");
    }

    fn update_message(&self, message: &str) {
        if self.is_active() {
            info!(text = message, "loading");
        }
    }

    fn is_active(&self) -> bool {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_fade(&self) {}

    fn remove(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Overlay for shells with nothing to show.
#[derive(Debug, Default)]
pub struct NoOverlay;

impl LoadingOverlay for NoOverlay {
    fn show(&self, _message: &str) {}
    fn update_message(&self, _message: &str) {}
    fn is_active(&self) -> bool {
        false
    }
    fn begin_fade(&self) {}
    fn remove(&self) {}
}

/// Navigator over an in-process path, recording every navigation.
#[derive(Debug)]
pub struct MemoryNavigator {
    path: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: Mutex::new(path.into()), history: Mutex::new(Vec::new()) }
    }

    /// Targets navigated to, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn navigate(&self, target: &str) {
        info!(to = target, "navigate");
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = target.to_owned();
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_owned());
    }
}

// =============================================================================
// DEFERRED WORK
// =============================================================================

/// Fade out the overlay, then remove it after `fade`. No-op when inactive.
pub fn dismiss_overlay(overlay: &Arc<dyn LoadingOverlay>, fade: Duration) {
    if !overlay.is_active() {
        return;
    }
    overlay.begin_fade();
    let overlay = Arc::clone(overlay);
    spawn_after(fade, move || overlay.remove());
}

/// Run `task` after `delay` on the current runtime. Without a runtime the
/// task runs immediately.
pub fn spawn_after(delay: Duration, task: impl FnOnce() + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                task();
            });
        }
        Err(_) => {
            warn!("no async runtime; running deferred task inline");
            task();
        }
    }
}

#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;
