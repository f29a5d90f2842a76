//! Provider subscription that feeds the auth gate and cache.
//!
//! DESIGN
//! ======
//! One subscription per shell. Every provider event rewrites the cache; only
//! the first event settles the gate. When the resulting state is "no user"
//! and auth is enabled, the unauthorized handler runs unless the user is
//! already on the sign-in page. A signed-in event re-arms the handler for
//! the next sign-out.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::cache::AuthStateCache;
use crate::config::ShellConfig;
use crate::gate::AuthGate;
use crate::provider::{AuthEvent, CredentialProvider, Subscription};
use crate::ui::Navigator;
use crate::unauthorized::UnauthorizedHandler;

pub struct AuthGuard {
    provider: Arc<dyn CredentialProvider>,
    handler: Arc<GuardHandler>,
    subscription: Mutex<Option<Subscription>>,
}

/// State-transition handler shared with the provider listener.
struct GuardHandler {
    config: Arc<ShellConfig>,
    gate: Arc<AuthGate>,
    cache: Arc<AuthStateCache>,
    navigator: Arc<dyn Navigator>,
    unauthorized: Arc<UnauthorizedHandler>,
}

impl AuthGuard {
    #[must_use]
    pub fn new(
        config: Arc<ShellConfig>,
        provider: Arc<dyn CredentialProvider>,
        gate: Arc<AuthGate>,
        cache: Arc<AuthStateCache>,
        navigator: Arc<dyn Navigator>,
        unauthorized: Arc<UnauthorizedHandler>,
    ) -> Self {
        let handler = Arc::new(GuardHandler { config, gate, cache, navigator, unauthorized });
        Self { provider, handler, subscription: Mutex::new(None) }
    }

    /// Subscribe to the provider. Returns false if already subscribed.
    pub fn initialize(&self) -> bool {
        let mut slot = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("auth guard already initialized, skipping");
            return false;
        }
        info!("auth guard initialized");
        let handler = Arc::clone(&self.handler);
        *slot = Some(self.provider.subscribe(Arc::new(move |event| handler.on_event(event))));
        true
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Drop the provider subscription so `initialize` subscribes again.
    pub fn reset(&self) {
        let previous = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(previous);
    }
}

impl GuardHandler {
    fn on_event(&self, event: AuthEvent) {
        let signed_in = match event {
            AuthEvent::Changed(user) => {
                let signed_in = user.is_some();
                if signed_in {
                    self.unauthorized.rearm();
                }
                self.cache.write(signed_in);
                self.gate.resolve(user);
                signed_in
            }
            AuthEvent::Failed(err) if err.is_critical() => {
                warn!(error = %err, "critical auth provider error");
                self.gate.reject(err);
                false
            }
            AuthEvent::Failed(err) => {
                warn!(error = %err, "auth provider error; treating as signed out");
                self.cache.write(false);
                self.gate.resolve(None);
                false
            }
        };

        if !signed_in && self.config.auth_enabled && !self.config.is_sign_in_page(&self.navigator.current_path()) {
            self.unauthorized.handle();
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
