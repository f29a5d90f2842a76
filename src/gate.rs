//! Auth state gate: a single-resolution future of the first observed user.
//!
//! DESIGN
//! ======
//! `Unresolved -> Resolved(user | None)` or `Unresolved -> Rejected(err)`.
//! The state lives in a `tokio::sync::watch` channel so any number of tasks
//! can await it, and late awaiters observe the settled value immediately.
//! Transitions use `send_if_modified`, which makes "first outcome wins" a
//! single atomic check-and-set.

use tokio::sync::watch;
use tracing::debug;

use crate::provider::{ProviderError, User};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Unresolved,
    Resolved(Option<User>),
    Rejected(ProviderError),
}

impl GateState {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

#[derive(Debug)]
pub struct AuthGate {
    tx: watch::Sender<GateState>,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::Unresolved);
        Self { tx }
    }

    /// Settle with `user`. Returns false if the gate had already settled.
    pub fn resolve(&self, user: Option<User>) -> bool {
        self.settle(GateState::Resolved(user))
    }

    /// Settle with a provider error. Returns false if already settled.
    pub fn reject(&self, err: ProviderError) -> bool {
        self.settle(GateState::Rejected(err))
    }

    fn settle(&self, next: GateState) -> bool {
        let settled = self.tx.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = next;
            true
        });
        if settled {
            debug!(state = ?*self.tx.borrow(), "auth gate settled");
        }
        settled
    }

    /// Wait for the gate to settle.
    ///
    /// # Errors
    ///
    /// Returns the provider error the gate was rejected with.
    pub async fn wait(&self) -> Result<Option<User>, ProviderError> {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(GateState::is_settled).await {
            Ok(state) => state.clone(),
            // Sender lives as long as `self`, so this only happens mid-teardown.
            Err(_) => self.state(),
        };
        match state {
            GateState::Resolved(user) => Ok(user),
            GateState::Rejected(err) => Err(err),
            GateState::Unresolved => Ok(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_settled()
    }

    /// Re-arm the gate. Pending waiters stay pending until the next outcome.
    pub fn reset_for_testing(&self) {
        self.tx.send_replace(GateState::Unresolved);
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
