//! Single-flight LRU cache (§4.7) used for both the info cache and the tile
//! cache, plus lock-free request counters (§4.11).
//!
//! Grounded in the donor's two independent singleflight implementations
//! (`SlideRegistry::get_slide` and `BlockCache::get_block`), generalized here
//! into one generic primitive: a fast-path LRU lookup under a read lock,
//! falling back to a leader/waiter race over a `Mutex<HashMap<K, Arc<Notify>>>`
//! so concurrent requests for the same key trigger exactly one computation.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};

/// Lock-free hit/miss/error counters for one cache instance.
#[derive(Debug, Default)]
pub struct Stats {
    gets: AtomicU64,
    hits: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub hits: u64,
    pub sets: u64,
    pub errors: u64,
}

/// A single-flight, bounded LRU cache keyed by `K`, values `V`.
///
/// `get_or_compute` guarantees that for a given key, only one caller among
/// any number of concurrent callers actually runs `compute`; the rest await
/// its result. Errors are not cached — a failed compute leaves the key
/// absent so the next caller retries.
pub struct SingleFlightCache<K, V> {
    entries: RwLock<LruCache<K, V>>,
    in_flight: Mutex<HashMap<K, Arc<Notify>>>,
    stats: Stats,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: std::num::NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Look up `key`; on miss, become the leader (run `compute`) or wait for
    /// whichever caller already is.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);

        if let Some(value) = self.entries.write().await.get(&key).cloned() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        loop {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(value) = self.entries.write().await.get(&key).cloned() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }

            if let Some(notify) = in_flight.get(&key).cloned() {
                drop(in_flight);
                notify.notified().await;
                // Waiters loop back around: the leader may have failed, in
                // which case the key is still absent and we re-race.
                continue;
            }

            // We are the leader.
            let notify = Arc::new(Notify::new());
            in_flight.insert(key.clone(), notify.clone());
            drop(in_flight);

            let result = compute().await;

            match &result {
                Ok(value) => {
                    self.entries.write().await.put(key.clone(), value.clone());
                    self.stats.sets.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            self.in_flight.lock().await.remove(&key);
            notify.notify_waiters();
            return result;
        }
    }

    /// Remove `key` if present, e.g. to force a re-fetch after an external
    /// invalidation signal.
    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.pop(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
