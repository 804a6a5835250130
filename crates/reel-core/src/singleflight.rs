//! Per-key request coalescing.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;

const SHARD_COUNT: usize = 16;

/// Coalesces concurrent calls for the same key into a single execution
/// whose outcome every caller shares.
///
/// Entries are removed once resolved, so a caller arriving after the work
/// completed starts a fresh execution rather than reading a stale result.
/// The key space is sharded to avoid a single hot lock. Coalescing is
/// in-memory and per-process.
pub struct Singleflight<T> {
    shards: Vec<Mutex<HashMap<String, Arc<OnceCell<T>>>>>,
}

impl<T: Clone> Singleflight<T> {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &str) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<T>>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % SHARD_COUNT;
        self.shards[index]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `work` for `key`, or wait on an execution already in flight.
    ///
    /// Returns the outcome and whether it was shared from another caller's
    /// execution (`false` for the caller that performed the work).
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self
            .shard(key)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let mut ran = false;
        let value = cell
            .get_or_init(|| {
                ran = true;
                work()
            })
            .await
            .clone();

        // The initiator retires the entry; callers that grabbed the cell
        // before removal still read the shared outcome, later callers
        // restart the path.
        if ran {
            let mut shard = self.shard(key);
            if shard.get(key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                shard.remove(key);
            }
        }

        (value, !ran)
    }
}

impl<T: Clone> Default for Singleflight<T> {
    fn default() -> Self {
        Self::new()
    }
}
