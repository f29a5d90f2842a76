//! Persisted key/value store for auth snapshots and refresh tokens.
//!
//! SYSTEM CONTEXT
//! ==============
//! Stands in for browser `localStorage`: string keys, string values,
//! best-effort writes. `FileStore` keeps the map in a JSON file so state
//! survives a process restart the way `localStorage` survives a reload.
//!
//! TRADE-OFFS
//! ==========
//! Writes never fail from the caller's point of view. Disk errors are logged
//! and the in-memory map stays authoritative for the rest of the process.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;
use uuid::Uuid;

/// `"authenticated"` or `"unauthenticated"`.
pub const LAST_AUTH_STATE_KEY: &str = "lastAuthState";
/// Epoch milliseconds of the last auth state write, as a decimal string.
pub const LAST_AUTH_TIME_KEY: &str = "lastAuthTime";
/// Opaque long-lived credential, removed on logout.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    /// Remove `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str);
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON-file-backed store. Every mutation rewrites the file atomically
/// (temp file + rename).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// or corrupt file is logged and also starts empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        Self { path, entries: Mutex::new(entries) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !apply(&mut entries) {
            return;
        }
        if let Err(e) = write_entries(&self.path, &entries) {
            warn!(error = %e, path = %self.path.display(), "store write failed; keeping in-memory value");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.mutate(|entries| {
            let previous = entries.insert(key.to_owned(), value.to_owned());
            previous.as_deref() != Some(value)
        });
    }

    fn remove(&self, key: &str) {
        self.mutate(|entries| entries.remove(key).is_some());
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "store read failed; starting empty");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "store file is not a JSON string map; starting empty");
            BTreeMap::new()
        }
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(entries).map_err(std::io::Error::other)?;
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
