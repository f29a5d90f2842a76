//! Credential provider contract.
//!
//! DESIGN
//! ======
//! An identity provider exposes three things: a push-based stream of auth
//! state changes, a synchronous peek at the current user, and async bearer
//! token retrieval that can be forced to mint a fresh token. Subscriptions
//! are observers detached by dropping the returned [`Subscription`].
//!
//! Providers that already know their state replay it to each new
//! subscriber, so a late subscriber still sees exactly one first event.

pub mod refresh;

use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};

pub use refresh::{RefreshTokenProvider, TokenEndpointConfig};

/// Provider could not reach its backend.
pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";
/// Provider backend failed internally.
pub const INTERNAL_ERROR: &str = "auth/internal-error";
/// Token requested while nobody is signed in.
pub const NO_CURRENT_USER: &str = "auth/no-current-user";

const CRITICAL_ERROR_CODES: [&str; 2] = [NETWORK_REQUEST_FAILED, INTERNAL_ERROR];

// =============================================================================
// USER
// =============================================================================

/// Signed-in identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned user identifier.
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl User {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), email: None, display_name: None }
    }
}

/// Synchronous view of the provider's current user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CurrentUser {
    /// Provider has not finished initializing.
    #[default]
    Unknown,
    SignedOut,
    SignedIn(User),
}

impl CurrentUser {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::Unknown | Self::SignedOut => None,
        }
    }

    /// The state a subscriber should see on replay, if any is known.
    #[must_use]
    pub fn as_event(&self) -> Option<AuthEvent> {
        match self {
            Self::Unknown => None,
            Self::SignedOut => Some(AuthEvent::Changed(None)),
            Self::SignedIn(user) => Some(AuthEvent::Changed(Some(user.clone()))),
        }
    }
}

impl From<Option<User>> for CurrentUser {
    fn from(user: Option<User>) -> Self {
        user.map_or(Self::SignedOut, Self::SignedIn)
    }
}

// =============================================================================
// ERRORS AND EVENTS
// =============================================================================

/// Error reported by the credential provider, keyed by a stable `auth/*` code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    /// Critical errors reject the auth gate instead of resolving it empty.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        CRITICAL_ERROR_CODES.contains(&self.code.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The signed-in user changed (`None` = signed out).
    Changed(Option<User>),
    Failed(ProviderError),
}

pub type AuthListener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Register `listener` for auth state changes until the returned
    /// subscription is dropped.
    fn subscribe(&self, listener: AuthListener) -> Subscription;

    fn current_user(&self) -> CurrentUser;

    /// Fetch a bearer token, minting a new one when `force_refresh` is set.
    async fn get_token(&self, force_refresh: bool) -> Result<String, ProviderError>;
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { unsubscribe: Some(Box::new(unsubscribe)) }
    }

    /// A subscription with nothing to detach.
    pub fn detached() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        self.run_unsubscribe();
    }

    fn run_unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Listener registry shared by provider implementations.
///
/// Delivery is serialized: a replay and every emitted event reach listeners
/// in one total order, and the replayed state is read under the same lock,
/// so a new subscriber never sees a stale replay after a newer event.
/// Listeners may unsubscribe re-entrantly but must not subscribe or emit on
/// the same set.
#[derive(Default)]
pub struct ListenerSet {
    inner: Mutex<ListenerSetInner>,
    delivery: Mutex<()>,
}

#[derive(Default)]
struct ListenerSetInner {
    next_id: u64,
    listeners: Vec<(u64, AuthListener)>,
}

impl ListenerSet {
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `listener`, then deliver the state returned by `current`, if
    /// any. `current` runs inside the delivery lock, so no event can slip
    /// between reading the state and registering.
    pub fn subscribe(
        self: &Arc<Self>,
        listener: AuthListener,
        current: impl FnOnce() -> Option<AuthEvent>,
    ) -> Subscription {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let replay = current();
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::clone(&listener)));
            id
        };

        if let Some(event) = replay {
            listener(event);
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(set) = weak.upgrade() {
                set.remove(id);
            }
        })
    }

    /// Deliver `event` to every registered listener.
    pub fn emit(&self, event: &AuthEvent) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let listeners: Vec<AuthListener> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.lock().listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerSetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
