//! TTL cache with bounded size and single-entry eviction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::core::Spawn;

/// Which entry leaves the cache when it grows past its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Oldest insertion, regardless of reads.
    #[default]
    InsertionOrder,
    /// Least recently read or written.
    LeastRecentlyUsed,
}

/// A cached value with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Cached value.
    pub data: T,
    /// When the value was stored.
    pub inserted_at: Instant,
    /// When the value stops being served.
    pub expires_at: Instant,
    /// Last read or write.
    pub last_accessed: Instant,
    /// Reads served from this entry.
    pub hit_count: u64,
    inserted_seq: u64,
    accessed_seq: u64,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to compute.
    pub misses: u64,
    /// Entries dropped to respect the size bound.
    pub evictions: u64,
    /// Entries dropped because they expired.
    pub expirations: u64,
    /// Live entries.
    pub size: usize,
    /// Configured bound.
    pub max_size: usize,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    stats: CacheStats,
    seq: u64,
}

impl<T> CacheState<T> {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Keyed cache with per-entry TTL and a hard size bound.
pub struct TtlCache<T> {
    state: Mutex<CacheState<T>>,
    default_ttl: Duration,
    max_size: usize,
    policy: EvictionPolicy,
}

impl<T: Clone> TtlCache<T> {
    /// Create a cache holding at most `max_size` entries.
    #[must_use]
    pub fn new(default_ttl: Duration, max_size: usize, policy: EvictionPolicy) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                stats: CacheStats {
                    max_size,
                    ..CacheStats::default()
                },
                seq: 0,
            }),
            default_ttl,
            max_size,
            policy,
        }
    }

    /// Live value for `key`, counting a hit or miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let seq = state.next_seq();

        let expired = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hit_count += 1;
                entry.last_accessed = now;
                entry.accessed_seq = seq;
                let data = entry.data.clone();
                state.stats.hits += 1;
                trace!(key, "cache hit");
                return Some(data);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
            state.stats.expirations += 1;
        }
        state.stats.misses += 1;
        state.stats.size = state.entries.len();
        None
    }

    /// Store `data` under `key`, evicting one entry if the bound is exceeded.
    pub fn insert(&self, key: impl Into<String>, data: T, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut state = self.state.lock();
        let seq = state.next_seq();
        state.entries.insert(
            key.into(),
            CacheEntry {
                data,
                inserted_at: now,
                expires_at: now + ttl,
                last_accessed: now,
                hit_count: 0,
                inserted_seq: seq,
                accessed_seq: seq,
            },
        );
        if state.entries.len() > self.max_size {
            self.evict_one(&mut state);
        }
        state.stats.size = state.entries.len();
    }

    /// Serve `key` from the cache or compute it with `f` and store the result.
    ///
    /// Errors from `f` are returned as-is and not cached. Concurrent misses on
    /// the same key may each call `f`; pair with a deduplicator to collapse them.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = f().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove a key.
    pub fn invalidate(&self, key: &str) -> Option<T> {
        let mut state = self.state.lock();
        let removed = state.entries.remove(key).map(|e| e.data);
        state.stats.size = state.entries.len();
        removed
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();
        state.stats.expirations += removed as u64;
        state.stats.size = state.entries.len();
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.stats.size = 0;
    }

    /// Whether `key` is stored and live, without touching counters.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Snapshot of the entry for `key`, expired or not.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    fn evict_one(&self, state: &mut CacheState<T>) {
        let victim = state
            .entries
            .iter()
            .min_by_key(|(_, e)| match self.policy {
                EvictionPolicy::InsertionOrder => e.inserted_seq,
                EvictionPolicy::LeastRecentlyUsed => e.accessed_seq,
            })
            .map(|(k, _)| k.clone());
        if let Some(key) = victim {
            state.entries.remove(&key);
            state.stats.evictions += 1;
            debug!(key = %key, policy = ?self.policy, "cache entry evicted");
        }
    }
}

impl<T: Clone + Send + 'static> TtlCache<T> {
    /// Start a background task on `spawner` that purges expired entries every
    /// `interval`.
    ///
    /// The task holds only a weak reference and stops once the cache is
    /// dropped, `true` is sent on the returned channel, or the channel is
    /// dropped.
    pub fn spawn_sweeper<S: Spawn>(
        self: &Arc<Self>,
        interval: Duration,
        spawner: &S,
    ) -> watch::Sender<bool> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let (stop_tx, mut stop) = watch::channel(false);
        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
            debug!("cache sweeper stopped");
        });
        stop_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TokioSpawner;

    fn cache(max: usize, policy: EvictionPolicy) -> TtlCache<u32> {
        TtlCache::new(Duration::from_secs(60), max, policy)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_and_expiry() {
        let c = cache(10, EvictionPolicy::InsertionOrder);
        c.insert("k", 1, Some(Duration::from_millis(100)));
        assert_eq!(c.get("k"), Some(1));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(c.get("k"), None);

        let stats = c.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_insertion_order_eviction_ignores_reads() {
        let c = cache(2, EvictionPolicy::InsertionOrder);
        c.insert("a", 1, None);
        c.insert("b", 2, None);
        assert_eq!(c.get("a"), Some(1));
        c.insert("c", 3, None);

        assert!(!c.contains("a"));
        assert!(c.contains("b"));
        assert!(c.contains("c"));
        assert_eq!(c.stats().evictions, 1);
    }

    #[test]
    fn test_lru_eviction_keeps_recent_reads() {
        let c = cache(2, EvictionPolicy::LeastRecentlyUsed);
        c.insert("a", 1, None);
        c.insert("b", 2, None);
        assert_eq!(c.get("a"), Some(1));
        c.insert("c", 3, None);

        assert!(c.contains("a"));
        assert!(!c.contains("b"));
        assert_eq!(c.len(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let c = cache(4, EvictionPolicy::InsertionOrder);
        let err: Result<u32, &str> = c.get_or_insert_with("k", None, || async { Err("boom") }).await;
        assert!(err.is_err());
        assert!(!c.contains("k"));

        let ok: Result<u32, &str> = c.get_or_insert_with("k", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        assert_eq!(c.entry("k").map(|e| e.hit_count), Some(0));

        let again: Result<u32, &str> =
            c.get_or_insert_with("k", None, || async { Ok(99) }).await;
        assert_eq!(again, Ok(7));
        assert_eq!(c.entry("k").map(|e| e.hit_count), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired() {
        let c = Arc::new(cache(4, EvictionPolicy::InsertionOrder));
        c.insert("short", 1, Some(Duration::from_millis(50)));
        c.insert("long", 2, Some(Duration::from_secs(10)));
        let stop = c.spawn_sweeper(Duration::from_millis(100), &TokioSpawner::current());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(c.len(), 1);
        assert!(c.contains("long"));

        drop(c);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(stop.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_signal() {
        let c = Arc::new(cache(4, EvictionPolicy::InsertionOrder));
        let stop = c.spawn_sweeper(Duration::from_millis(100), &TokioSpawner::current());

        stop.send_replace(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(stop.is_closed());

        c.insert("short", 1, Some(Duration::from_millis(50)));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(c.len(), 1);
    }
}
