//! Auth state cache used for optimistic rendering.
//!
//! DESIGN
//! ======
//! A two-key snapshot (`lastAuthState`, `lastAuthTime`) written on every
//! provider state change. Staleness is evaluated lazily on read; nothing
//! sweeps expired entries. A missing or half-written pair reads as "no
//! cache", so the two keys need not update atomically.
//!
//! A live signed-in user upgrades a stale or missing snapshot to
//! authenticated. A live signed-out user never downgrades a fresh positive
//! snapshot; the provider corrects that in the background.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::CurrentUser;
use crate::storage::{KeyValueStore, LAST_AUTH_STATE_KEY, LAST_AUTH_TIME_KEY};

pub const AUTHENTICATED: &str = "authenticated";
pub const UNAUTHENTICATED: &str = "unauthenticated";

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub observed_at_ms: u64,
}

impl AuthSnapshot {
    /// Fresh while `now - observed_at < window`. Timestamps from the future
    /// count as fresh.
    #[must_use]
    pub fn is_fresh_at(&self, now_ms: u64, window: Duration) -> bool {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        now_ms.saturating_sub(self.observed_at_ms) < window_ms
    }
}

pub struct AuthStateCache {
    store: Arc<dyn KeyValueStore>,
    window: Duration,
}

impl AuthStateCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Load the persisted snapshot, if both keys are present and well formed.
    #[must_use]
    pub fn snapshot(&self) -> Option<AuthSnapshot> {
        let state = self.store.get(LAST_AUTH_STATE_KEY)?;
        let observed_at_ms = self.store.get(LAST_AUTH_TIME_KEY)?.trim().parse::<u64>().ok()?;
        let is_authenticated = match state.as_str() {
            AUTHENTICATED => true,
            UNAUTHENTICATED => false,
            _ => return None,
        };
        Some(AuthSnapshot { is_authenticated, observed_at_ms })
    }

    /// `Some(true)` when the cache (or a live signed-in user) says the user is
    /// authenticated, otherwise `None`.
    #[must_use]
    pub fn read(&self, live: &CurrentUser) -> Option<bool> {
        self.read_at(now_ms(), live)
    }

    /// Internal: read with explicit timestamp (for testing).
    pub(crate) fn read_at(&self, now_ms: u64, live: &CurrentUser) -> Option<bool> {
        let fresh_positive = self
            .snapshot()
            .is_some_and(|snap| snap.is_authenticated && snap.is_fresh_at(now_ms, self.window));
        if fresh_positive {
            debug!("fresh cached auth state");
            return Some(true);
        }
        if live.is_signed_in() {
            debug!("cached auth state stale or missing; live user present");
            return Some(true);
        }
        None
    }

    pub fn write(&self, is_authenticated: bool) {
        self.write_at(now_ms(), is_authenticated);
    }

    pub(crate) fn write_at(&self, now_ms: u64, is_authenticated: bool) {
        let state = if is_authenticated { AUTHENTICATED } else { UNAUTHENTICATED };
        self.store.set(LAST_AUTH_STATE_KEY, state);
        self.store.set(LAST_AUTH_TIME_KEY, &now_ms.to_string());
    }

    pub fn clear(&self) {
        self.store.remove(LAST_AUTH_STATE_KEY);
        self.store.remove(LAST_AUTH_TIME_KEY);
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
