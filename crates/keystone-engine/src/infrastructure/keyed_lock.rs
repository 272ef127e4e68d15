//! Per-key async mutexes
//!
//! Serializes read-modify-write cycles on one curve or one user while
//! letting different keys proceed in parallel.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map size above which idle entries are pruned
const PRUNE_THRESHOLD: usize = 1_024;

#[derive(Debug)]
pub struct KeyedLocks<K> {
    entries: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock().await;
            if entries.len() > PRUNE_THRESHOLD {
                entries.retain(|_, m| Arc::strong_count(m) > 1);
            }
            entries.entry(key.clone()).or_default().clone()
        };
        entry.lock_owned().await
    }
}
