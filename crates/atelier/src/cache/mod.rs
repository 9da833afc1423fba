//! Stale-while-revalidate caching.
//!
//! Reads never block on the network: [`SwrCache::get`] hands back whatever is
//! stored, fresh or not. Fetching only happens through
//! [`SwrCache::get_or_fetch`], which shares one fill per key among concurrent callers.

pub mod results;

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

pub use results::{CacheKey, ResourceKind, ResultsCache, ResultsSnapshot};

/// Entries kept before the least recently used ones are evicted.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    pub ttl: Duration,
    pub stale: bool,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            ttl,
            stale: false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        !self.stale && self.fetched_at.elapsed() < self.ttl
    }
}

/// A value read from the cache along with whether it is still fresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub fresh: bool,
}

/// One fill in progress. Every caller that joins it gets the same outcome.
type Fill<V, E> = Arc<OnceCell<Result<V, E>>>;

/// Entries live in a bounded moka store with no expiry of its own: an expired
/// entry stays readable until it is refetched or evicted for capacity.
pub struct SwrCache<K, V, E> {
    entries: Cache<K, CacheEntry<V>>,
    /// The fill currently running for each key, if any.
    inflight: Mutex<HashMap<K, Fill<V, E>>>,
}

impl<K, V, E> Default for SwrCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> SwrCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Last known value, stale or not. Never fetches.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value)
    }

    /// Last known value with its freshness. Never fetches.
    pub fn peek(&self, key: &K) -> Option<Cached<V>> {
        self.entries.get(key).map(|entry| Cached {
            fresh: entry.is_fresh(),
            value: entry.value,
        })
    }

    fn fresh_value(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(CacheEntry::is_fresh)
            .map(|entry| entry.value)
    }

    /// Returns the stored value if it is fresh, otherwise runs `fetcher`,
    /// stores its result under `ttl` and returns it.
    ///
    /// Concurrent callers for the same key join a single fetch and all get
    /// its outcome, error included; only one fetcher runs. A failed fetch
    /// leaves the previous entry in place. If the caller driving the fetch is
    /// dropped, one of the waiters takes over with its own fetcher.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: K,
        fetcher: F,
        ttl: Duration,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.fresh_value(&key) {
            return Ok(value);
        }

        let fill = {
            let mut map = self.inflight.lock().await;
            Arc::clone(map.entry(key.clone()).or_default())
        };

        let result = fill
            .get_or_init(|| async {
                // A fill may have finished between the check above and joining.
                if let Some(value) = self.fresh_value(&key) {
                    return Ok(value);
                }
                let fetched = fetcher().await;
                if let Ok(value) = &fetched {
                    let entry = CacheEntry::new(value.clone(), ttl);
                    self.entries.insert(key.clone(), entry);
                }
                fetched
            })
            .await
            .clone();

        self.finish_fill(&key, &fill).await;
        result
    }

    /// Retires the key's fill so the next miss starts a new one.
    async fn finish_fill(&self, key: &K, fill: &Fill<V, E>) {
        let mut map = self.inflight.lock().await;
        if map.get(key).is_some_and(|current| Arc::ptr_eq(current, fill)) {
            map.remove(key);
        }
    }

    /// Marks an entry stale so the next `get_or_fetch` refetches. The value
    /// stays readable. Returns whether the key was present.
    pub fn invalidate(&self, key: &K) -> bool {
        match self.entries.get(key) {
            Some(mut entry) => {
                entry.stale = true;
                self.entries.insert(key.clone(), entry);
                true
            }
            None => false,
        }
    }

    /// Marks every entry matching `predicate` stale.
    pub fn invalidate_where<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let matching: Vec<(K, CacheEntry<V>)> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(&**key))
            .map(|(key, entry)| ((*key).clone(), entry))
            .collect();

        let count = matching.len();
        for (key, mut entry) in matching {
            entry.stale = true;
            self.entries.insert(key, entry);
        }
        count
    }

    /// Removes an entry outright.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        usize::try_from(self.entries.entry_count()).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_fetcher() {
        let cache: SwrCache<&str, u32, String> = SwrCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(
                    "k",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(7)
                    },
                    TTL,
                )
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches() {
        let cache: SwrCache<&str, u32, String> = SwrCache::new();
        cache
            .get_or_fetch("k", || async { Ok::<_, String>(1) }, TTL)
            .await
            .unwrap();

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(cache.peek(&"k"), Some(Cached { value: 1, fresh: false }));

        let value = cache
            .get_or_fetch("k", || async { Ok::<_, String>(2) }, TTL)
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_get_never_fetches() {
        let cache: SwrCache<&str, u32, String> = SwrCache::new();
        assert_eq!(cache.get(&"missing"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_keeps_value_readable() {
        let cache: SwrCache<&str, u32, String> = SwrCache::new();
        cache
            .get_or_fetch("k", || async { Ok::<_, String>(5) }, TTL)
            .await
            .unwrap();

        assert!(cache.invalidate(&"k"));
        assert_eq!(cache.get(&"k"), Some(5));
        assert_eq!(cache.peek(&"k").map(|c| c.fresh), Some(false));
        assert!(!cache.invalidate(&"other"));

        let value = cache
            .get_or_fetch("k", || async { Ok::<_, String>(6) }, TTL)
            .await
            .unwrap();
        assert_eq!(value, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_value() {
        let cache: SwrCache<&str, u32, String> = SwrCache::new();
        cache
            .get_or_fetch("k", || async { Ok::<_, String>(3) }, TTL)
            .await
            .unwrap();
        cache.invalidate(&"k");

        let result = cache
            .get_or_fetch("k", || async { Err::<u32, _>("boom".to_string()) }, TTL)
            .await;
        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(cache.get(&"k"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_where() {
        let cache: SwrCache<(u8, u8), u8, String> = SwrCache::new();
        for key in [(1, 1), (1, 2), (2, 1)] {
            cache
                .get_or_fetch(key, || async { Ok::<_, String>(0) }, TTL)
                .await
                .unwrap();
        }
        assert_eq!(cache.invalidate_where(|(a, _)| *a == 1), 2);
        assert_eq!(cache.peek(&(2, 1)).map(|c| c.fresh), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_fills_are_retired() {
        let cache: SwrCache<&str, u32, String> = SwrCache::new();
        cache
            .get_or_fetch("k", || async { Ok::<_, String>(1) }, TTL)
            .await
            .unwrap();
        assert!(cache.inflight.lock().await.is_empty());

        let _ = cache
            .get_or_fetch("e", || async { Err::<u32, _>("down".to_string()) }, TTL)
            .await;
        assert!(cache.inflight.lock().await.is_empty());
    }
}
