//! TTL cache with single-flight recomputation

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;

type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a live entry
    pub hits: u64,
    /// Started a computation
    pub misses: u64,
    /// Awaited a computation another caller started
    pub joined: u64,
    pub invalidations: u64,
}

struct State<V, E> {
    entries: HashMap<String, Entry<V>>,
    in_flight: HashMap<String, InFlight<V, E>>,
    stats: CacheStats,
}

/// Keyed cache of producer results
///
/// A concurrent miss on the same key shares one in-flight producer. Only
/// successful results are stored; a failure is handed to every waiter and
/// the next call retries. When disabled every call runs its producer.
pub struct CachingLayer<V, E> {
    enabled: AtomicBool,
    state: Mutex<State<V, E>>,
}

impl<V, E> Default for CachingLayer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(true)
    }
}

impl<V, E> CachingLayer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            state: Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn caching on or off. Turning it off drops every entry.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was && !enabled {
            self.invalidate_all();
        }
    }

    /// Return the live entry for `key`, or run `producer` and store its
    /// result for `ttl`
    pub async fn get_or_compute<F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if !self.is_enabled() {
            return producer().await;
        }

        let flight = {
            let mut state = self.state.lock();

            if let Some(entry) = state.entries.get(key) {
                if Instant::now() < entry.expires_at {
                    let value = entry.value.clone();
                    state.stats.hits += 1;
                    return Ok(value);
                }
                state.entries.remove(key);
            }

            match state.in_flight.get(key).cloned() {
                Some(flight) => {
                    state.stats.joined += 1;
                    flight
                }
                None => {
                    state.stats.misses += 1;
                    let flight = producer().boxed().shared();
                    state.in_flight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        // Whoever observes completion first clears the marker. A marker that
        // was invalidated or replaced meanwhile belongs to someone else.
        let mut state = self.state.lock();
        let current = state
            .in_flight
            .get(key)
            .is_some_and(|marker| marker.ptr_eq(&flight));
        if current {
            state.in_flight.remove(key);
            if let Ok(value) = &result {
                state.entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.clone(),
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
        }

        result
    }

    /// Live entry for `key`, without computing
    pub fn get(&self, key: &str) -> Option<V> {
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.value.clone())
    }

    /// Drop `key`. A computation already running for it still answers its
    /// waiters but is not stored.
    pub fn invalidate(&self, key: &str) {
        let mut state = self.state.lock();
        state.entries.remove(key);
        state.in_flight.remove(key);
        state.stats.invalidations += 1;
    }

    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.in_flight.clear();
        state.stats.invalidations += 1;
    }

    /// Number of stored entries, expired ones included until next touched
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    type Cache = CachingLayer<String, String>;

    fn counting_producer(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, String>> {
        let calls = calls.clone();
        move || {
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(format!("value-{}", n))
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_computation() {
        let cache = Cache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let (a, b) = tokio::join!(
            cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::from_secs(1))),
            cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::from_secs(1))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), "value-1");
        assert_eq!(b.unwrap(), "value-1");

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.joined, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = Cache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::ZERO)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        let cached = cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::ZERO)).await;
        assert_eq!(cached.unwrap(), "value-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").is_none());
        let fresh = cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::ZERO)).await;
        assert_eq!(fresh.unwrap(), "value-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = Cache::default();
        let ttl = Duration::from_secs(60);

        let err = cache
            .get_or_compute("k", ttl, || async { Err::<String, _>("down".to_string()) })
            .await;
        assert_eq!(err.unwrap_err(), "down");
        assert!(cache.is_empty());

        let ok = cache
            .get_or_compute("k", ttl, || async { Ok::<_, String>("up".to_string()) })
            .await;
        assert_eq!(ok.unwrap(), "up");
        assert_eq!(cache.get("k").as_deref(), Some("up"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_discards_in_flight_result() {
        let cache = Arc::new(Cache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let pending = {
            let cache = cache.clone();
            let producer = counting_producer(&calls, Duration::from_secs(5));
            tokio::spawn(async move { cache.get_or_compute("k", ttl, producer).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        cache.invalidate_all();

        assert_eq!(pending.await.unwrap().unwrap(), "value-1");
        assert!(cache.get("k").is_none());

        let next = cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::ZERO)).await;
        assert_eq!(next.unwrap(), "value-2");
    }

    #[tokio::test]
    async fn test_disabled_cache_passes_through() {
        let cache = Cache::new(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            cache.get_or_compute("k", ttl, counting_producer(&calls, Duration::ZERO)).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disabling_drops_entries() {
        let cache = Cache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_compute("k", Duration::from_secs(60), counting_producer(&calls, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        cache.set_enabled(false);
        assert!(cache.is_empty());
        assert!(!cache.is_enabled());
    }
}
