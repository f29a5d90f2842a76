use super::*;
use crate::provider::User;
use crate::storage::MemoryStore;

const WINDOW: Duration = Duration::from_millis(120_000);
const NOW: u64 = 1_700_000_000_000;

fn cache() -> (Arc<MemoryStore>, AuthStateCache) {
    let store = Arc::new(MemoryStore::new());
    let cache = AuthStateCache::new(store.clone(), WINDOW);
    (store, cache)
}

// =============================================================================
// AuthSnapshot
// =============================================================================

#[test]
fn snapshot_fresh_inside_window() {
    let snap = AuthSnapshot { is_authenticated: true, observed_at_ms: NOW - 1_000 };
    assert!(snap.is_fresh_at(NOW, WINDOW));
}

#[test]
fn snapshot_stale_at_window_boundary() {
    let snap = AuthSnapshot { is_authenticated: true, observed_at_ms: NOW - 120_000 };
    assert!(!snap.is_fresh_at(NOW, WINDOW));
    let just_inside = AuthSnapshot { is_authenticated: true, observed_at_ms: NOW - 119_999 };
    assert!(just_inside.is_fresh_at(NOW, WINDOW));
}

#[test]
fn snapshot_from_future_is_fresh() {
    let snap = AuthSnapshot { is_authenticated: true, observed_at_ms: NOW + 5_000 };
    assert!(snap.is_fresh_at(NOW, WINDOW));
}

// =============================================================================
// read
// =============================================================================

#[test]
fn read_fresh_authenticated_is_some_true() {
    let (_store, cache) = cache();
    cache.write_at(NOW - 1_000, true);
    assert_eq!(cache.read_at(NOW, &CurrentUser::Unknown), Some(true));
}

#[test]
fn read_stale_is_none() {
    let (_store, cache) = cache();
    cache.write_at(NOW - 120_000, true);
    assert_eq!(cache.read_at(NOW, &CurrentUser::Unknown), None);
    assert_eq!(cache.read_at(NOW, &CurrentUser::SignedOut), None);
}

#[test]
fn read_fresh_unauthenticated_is_none() {
    let (_store, cache) = cache();
    cache.write_at(NOW - 1_000, false);
    assert_eq!(cache.read_at(NOW, &CurrentUser::Unknown), None);
}

#[test]
fn read_missing_is_none() {
    let (_store, cache) = cache();
    assert_eq!(cache.read_at(NOW, &CurrentUser::Unknown), None);
}

#[test]
fn live_user_upgrades_stale_snapshot() {
    let (_store, cache) = cache();
    cache.write_at(NOW - 600_000, false);
    let live = CurrentUser::SignedIn(User::new("u1"));
    assert_eq!(cache.read_at(NOW, &live), Some(true));
}

#[test]
fn live_signed_out_does_not_downgrade_fresh_positive() {
    let (_store, cache) = cache();
    cache.write_at(NOW - 1_000, true);
    assert_eq!(cache.read_at(NOW, &CurrentUser::SignedOut), Some(true));
}

#[test]
fn half_written_pair_reads_as_no_cache() {
    let (store, cache) = cache();
    store.set(LAST_AUTH_STATE_KEY, AUTHENTICATED);
    assert_eq!(cache.snapshot(), None);
    assert_eq!(cache.read_at(NOW, &CurrentUser::Unknown), None);
}

#[test]
fn malformed_values_read_as_no_cache() {
    let (store, cache) = cache();
    store.set(LAST_AUTH_STATE_KEY, "maybe");
    store.set(LAST_AUTH_TIME_KEY, &NOW.to_string());
    assert_eq!(cache.snapshot(), None);

    store.set(LAST_AUTH_STATE_KEY, AUTHENTICATED);
    store.set(LAST_AUTH_TIME_KEY, "yesterday");
    assert_eq!(cache.snapshot(), None);
}

// =============================================================================
// write / clear
// =============================================================================

#[test]
fn write_persists_both_keys() {
    let (store, cache) = cache();
    cache.write_at(NOW, true);
    assert_eq!(store.get(LAST_AUTH_STATE_KEY).as_deref(), Some(AUTHENTICATED));
    assert_eq!(store.get(LAST_AUTH_TIME_KEY), Some(NOW.to_string()));

    cache.write_at(NOW + 10, false);
    assert_eq!(
        cache.snapshot(),
        Some(AuthSnapshot { is_authenticated: false, observed_at_ms: NOW + 10 })
    );
}

#[test]
fn clear_removes_snapshot() {
    let (store, cache) = cache();
    cache.write(true);
    cache.clear();
    assert_eq!(store.get(LAST_AUTH_STATE_KEY), None);
    assert_eq!(store.get(LAST_AUTH_TIME_KEY), None);
    assert_eq!(cache.read(&CurrentUser::Unknown), None);
}

#[test]
fn write_then_read_with_wall_clock() {
    let (_store, cache) = cache();
    cache.write(true);
    assert_eq!(cache.read(&CurrentUser::Unknown), Some(true));
}
