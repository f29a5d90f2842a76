//! Composition root owning all process-scoped auth state.
//!
//! ARCHITECTURE
//! ============
//! One `AuthShell` per process (or per test). It owns the gate, the guard
//! subscription, and the installed interceptor, and hands `Arc` handles to
//! the components that need them. Nothing here is a global: two shells in
//! one process are fully independent.
//!
//! ```text
//! AuthShell
//!  ├── AuthGate ◄── AuthGuard ◄── CredentialProvider events
//!  ├── PageGuard ──► AuthStateCache, AuthGate (timeout race)
//!  └── AuthInterceptor ──► RequestAuthorizer ──► AuthGate
//!          └── 401 x2 ──► UnauthorizedHandler
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::authorizer::RequestAuthorizer;
use crate::cache::AuthStateCache;
use crate::config::ShellConfig;
use crate::gate::AuthGate;
use crate::guard::AuthGuard;
use crate::interceptor::AuthInterceptor;
use crate::page::{GuardDecision, PageGuard, PageOutcome, ProtectOptions};
use crate::provider::CredentialProvider;
use crate::sender::RequestSender;
use crate::storage::KeyValueStore;
use crate::ui::{LoadingOverlay, Navigator, Notifier};
use crate::unauthorized::UnauthorizedHandler;

/// Environment-specific collaborators injected into the shell.
pub struct ShellServices {
    pub store: Arc<dyn KeyValueStore>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub overlay: Arc<dyn LoadingOverlay>,
}

pub struct AuthShell {
    config: Arc<ShellConfig>,
    provider: Arc<dyn CredentialProvider>,
    navigator: Arc<dyn Navigator>,
    cache: Arc<AuthStateCache>,
    gate: Arc<AuthGate>,
    guard: Arc<AuthGuard>,
    page: PageGuard,
    unauthorized: Arc<UnauthorizedHandler>,
    interceptor: Mutex<Option<Arc<AuthInterceptor>>>,
}

impl AuthShell {
    #[must_use]
    pub fn new(config: ShellConfig, provider: Arc<dyn CredentialProvider>, services: ShellServices) -> Self {
        let ShellServices { store, navigator, notifier, overlay } = services;
        let config = Arc::new(config);
        let cache = Arc::new(AuthStateCache::new(Arc::clone(&store), config.freshness_window));
        let gate = Arc::new(AuthGate::new());
        let unauthorized = Arc::new(UnauthorizedHandler::new(
            store,
            Arc::clone(&cache),
            Arc::clone(&overlay),
            notifier,
            Arc::clone(&navigator),
            Arc::clone(&config),
        ));
        let guard = Arc::new(AuthGuard::new(
            Arc::clone(&config),
            Arc::clone(&provider),
            Arc::clone(&gate),
            Arc::clone(&cache),
            Arc::clone(&navigator),
            Arc::clone(&unauthorized),
        ));
        let page = PageGuard::new(
            Arc::clone(&config),
            Arc::clone(&provider),
            Arc::clone(&gate),
            Arc::clone(&cache),
            Arc::clone(&guard),
            Arc::clone(&navigator),
            overlay,
        );
        Self {
            config,
            provider,
            navigator,
            cache,
            gate,
            guard,
            page,
            unauthorized,
            interceptor: Mutex::new(None),
        }
    }

    /// Subscribe the gate to the provider. Returns false if already done.
    pub fn initialize_guard(&self) -> bool {
        self.guard.initialize()
    }

    /// Wrap `underlying` with the auth interceptor. Only the first call
    /// wraps; later calls return the already-installed interceptor.
    pub fn install_interceptor(&self, underlying: Arc<dyn RequestSender>) -> Arc<AuthInterceptor> {
        let mut slot = self.interceptor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(installed) = slot.as_ref() {
            return Arc::clone(installed);
        }
        info!(base_url = %self.config.base_url, "installing auth interceptor");
        let authorizer = RequestAuthorizer::new(
            Arc::clone(&self.config),
            Arc::clone(&self.gate),
            Arc::clone(&self.provider),
        );
        let interceptor = Arc::new(AuthInterceptor::new(
            underlying,
            authorizer,
            Arc::clone(&self.unauthorized),
            Arc::clone(&self.config),
        ));
        *slot = Some(Arc::clone(&interceptor));
        interceptor
    }

    #[must_use]
    pub fn interceptor(&self) -> Option<Arc<AuthInterceptor>> {
        self.interceptor.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub async fn decide(&self, path: &str) -> GuardDecision {
        self.page.decide(path).await
    }

    pub async fn protect(&self, options: ProtectOptions) -> PageOutcome {
        self.page.protect(options).await
    }

    /// Force a sign-out. Returns false if one already ran since the user
    /// last signed in.
    pub fn handle_unauthorized(&self) -> bool {
        self.unauthorized.handle()
    }

    /// Page-load startup: install the interceptor when an API origin is
    /// configured, then protect the current page. The returned sender is the
    /// one application code should use.
    pub async fn bootstrap(&self, underlying: Arc<dyn RequestSender>) -> (Arc<dyn RequestSender>, PageOutcome) {
        let sender: Arc<dyn RequestSender> = if self.config.interceptor_enabled() {
            let interceptor: Arc<dyn RequestSender> = self.install_interceptor(underlying);
            interceptor
        } else {
            underlying
        };

        let outcome = if self.config.auth_enabled {
            self.protect(ProtectOptions::default()).await
        } else {
            PageOutcome::Authenticated(self.provider.current_user().user().cloned())
        };
        (sender, outcome)
    }

    /// Re-arm the gate and the sign-out handler, drop the provider
    /// subscription, and uninstall the interceptor, as a fresh process would
    /// start.
    pub fn reset_for_testing(&self) {
        self.guard.reset();
        self.gate.reset_for_testing();
        self.interceptor.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.unauthorized.rearm();
    }

    #[must_use]
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    #[must_use]
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    #[must_use]
    pub fn cache(&self) -> &AuthStateCache {
        &self.cache
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    #[must_use]
    pub fn is_guard_initialized(&self) -> bool {
        self.guard.is_initialized()
    }
}

#[cfg(test)]
#[path = "shell_test.rs"]
mod tests;
