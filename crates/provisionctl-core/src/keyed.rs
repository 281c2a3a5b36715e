//! Per-identity serialization of non-atomic updates
//!
//! Some backend resources can only be modified by reading the whole object,
//! changing it locally and writing it back. Two such updates against the same
//! identity must not interleave. [`KeyedMutex`] hands out one async lock per
//! key; entries are reference counted and dropped from the registry when the
//! last holder or waiter for that key goes away, so the map never grows past
//! the set of identities currently in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Registry of named async locks
#[derive(Debug, Clone, Default)]
pub struct KeyedMutex {
    entries: Registry,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    ///
    /// The returned guard releases the lock when dropped, on success and
    /// error paths alike.
    pub async fn lock(&self, key: impl Into<String>) -> KeyedGuard {
        let key = key.into();
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        trace!("Waiting for lock on {}", key);
        let guard = entry.clone().lock_owned().await;
        trace!("Acquired lock on {}", key);

        KeyedGuard {
            key,
            entry,
            guard: Some(guard),
            entries: self.entries.clone(),
        }
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one key of a [`KeyedMutex`]
#[derive(Debug)]
pub struct KeyedGuard {
    key: String,
    entry: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    entries: Registry,
}

impl KeyedGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // Release first so a waiter can proceed even if eviction is skipped
        self.guard.take();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map and one here means nobody else wants the key
        if Arc::strong_count(&self.entry) == 2 {
            entries.remove(&self.key);
        }
        trace!("Released lock on {}", self.key);
    }
}
