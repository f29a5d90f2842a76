use std::time::Duration;

use super::*;
use crate::gate::GateState;
use crate::provider::{CurrentUser, INTERNAL_ERROR, NETWORK_REQUEST_FAILED, ProviderError, User};
use crate::storage::{KeyValueStore, MemoryStore, REFRESH_TOKEN_KEY};
use crate::test_helpers::{FakeProvider, RecordingNotifier, test_config};
use crate::ui::{MemoryNavigator, NoOverlay};

struct Fixture {
    provider: Arc<FakeProvider>,
    gate: Arc<AuthGate>,
    cache: Arc<AuthStateCache>,
    store: Arc<MemoryStore>,
    navigator: Arc<MemoryNavigator>,
    notifier: Arc<RecordingNotifier>,
    guard: AuthGuard,
}

fn fixture(config: ShellConfig, path: &str) -> Fixture {
    let config = Arc::new(config);
    let provider = FakeProvider::new();
    let gate = Arc::new(AuthGate::new());
    let store = Arc::new(MemoryStore::new());
    store.set(REFRESH_TOKEN_KEY, "rt");
    let cache = Arc::new(AuthStateCache::new(store.clone(), config.freshness_window));
    let navigator = Arc::new(MemoryNavigator::new(path));
    let notifier = Arc::new(RecordingNotifier::default());
    let unauthorized = Arc::new(UnauthorizedHandler::new(
        store.clone(),
        Arc::clone(&cache),
        Arc::new(NoOverlay),
        notifier.clone(),
        navigator.clone(),
        Arc::clone(&config),
    ));
    let guard = AuthGuard::new(
        config,
        provider.clone(),
        Arc::clone(&gate),
        Arc::clone(&cache),
        navigator.clone(),
        unauthorized,
    );
    Fixture { provider, gate, cache, store, navigator, notifier, guard }
}

#[test]
fn initialize_subscribes_exactly_once() {
    let fx = fixture(test_config(), "/home.html");
    assert!(!fx.guard.is_initialized());
    assert!(fx.guard.initialize());
    assert!(!fx.guard.initialize());
    assert!(!fx.guard.initialize());
    assert!(fx.guard.is_initialized());
    assert_eq!(fx.provider.subscribe_calls(), 1);
    assert_eq!(fx.provider.listener_count(), 1);
}

#[test]
fn reset_unsubscribes_and_rearms() {
    let fx = fixture(test_config(), "/home.html");
    fx.guard.initialize();
    fx.guard.reset();
    assert_eq!(fx.provider.listener_count(), 0);
    assert!(fx.guard.initialize());
    assert_eq!(fx.provider.subscribe_calls(), 2);
}

#[test]
fn first_event_settles_gate_later_events_only_update_cache() {
    let fx = fixture(test_config(), "/home.html");
    fx.guard.initialize();

    fx.provider.emit_user(Some(User::new("u1")));
    fx.provider.emit_user(None);
    fx.provider.emit_error(ProviderError::new(NETWORK_REQUEST_FAILED, "offline"));
    fx.provider.emit_user(Some(User::new("u2")));

    assert_eq!(fx.gate.state(), GateState::Resolved(Some(User::new("u1"))));
    assert_eq!(fx.cache.snapshot().map(|s| s.is_authenticated), Some(true));
}

#[test]
fn signed_in_replay_settles_gate_on_subscribe() {
    let fx = fixture(test_config(), "/home.html");
    fx.provider.set_current(CurrentUser::SignedIn(User::new("u1")));
    fx.guard.initialize();

    assert_eq!(fx.gate.state(), GateState::Resolved(Some(User::new("u1"))));
    assert_eq!(fx.cache.read(&CurrentUser::Unknown), Some(true));
    assert!(fx.notifier.notices().is_empty());
}

#[test]
fn critical_error_rejects_gate_without_cache_write() {
    let fx = fixture(test_config(), "/auth.html");
    fx.guard.initialize();

    let err = ProviderError::new(INTERNAL_ERROR, "boom");
    fx.provider.emit_error(err.clone());

    assert_eq!(fx.gate.state(), GateState::Rejected(err));
    assert_eq!(fx.cache.snapshot(), None);
}

#[test]
fn non_critical_error_resolves_gate_empty() {
    let fx = fixture(test_config(), "/auth.html");
    fx.guard.initialize();

    fx.provider.emit_error(ProviderError::new("auth/user-disabled", "disabled"));

    assert_eq!(fx.gate.state(), GateState::Resolved(None));
    assert_eq!(fx.cache.snapshot().map(|s| s.is_authenticated), Some(false));
}

#[tokio::test(start_paused = true)]
async fn signed_out_event_redirects_off_protected_page() {
    let fx = fixture(test_config(), "/home.html");
    fx.guard.initialize();

    fx.provider.emit_user(None);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fx.store.get(REFRESH_TOKEN_KEY), None);
    assert_eq!(fx.navigator.history(), vec!["auth.html".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn provider_error_redirects_off_protected_page() {
    let fx = fixture(test_config(), "/home.html");
    fx.guard.initialize();

    fx.provider.emit_error(ProviderError::new(NETWORK_REQUEST_FAILED, "offline"));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fx.navigator.history(), vec!["auth.html".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn no_redirect_on_sign_in_page() {
    let fx = fixture(test_config(), "/app/auth.html");
    fx.guard.initialize();

    fx.provider.emit_user(None);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(fx.navigator.history().is_empty());
    assert_eq!(fx.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("rt"));
}

#[tokio::test(start_paused = true)]
async fn no_redirect_when_auth_disabled() {
    let config = ShellConfig { auth_enabled: false, ..test_config() };
    let fx = fixture(config, "/home.html");
    fx.guard.initialize();

    fx.provider.emit_user(None);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(fx.navigator.history().is_empty());
    assert_eq!(fx.gate.state(), GateState::Resolved(None));
}

#[tokio::test(start_paused = true)]
async fn sign_in_rearms_sign_out_notice() {
    let fx = fixture(test_config(), "/home.html");
    fx.guard.initialize();

    fx.provider.emit_user(None);
    fx.provider.emit_error(ProviderError::new("auth/user-disabled", "disabled"));
    assert_eq!(fx.notifier.notices().len(), 1);

    fx.provider.emit_user(Some(User::new("u1")));
    fx.provider.emit_user(None);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fx.notifier.notices().len(), 2);
    assert_eq!(fx.navigator.history().len(), 2);
}
