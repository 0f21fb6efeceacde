//! In-memory, per-entry TTL cache shared by all aggregations.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, warn};

use crate::domain::{CacheStatus, Query};
use crate::error::CacheStoreError;
use crate::ProviderId;

/// Defines how a lookup interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read a live entry if present; otherwise compute and store. (Default)
    #[default]
    Use,
    /// Skip the read, compute, and store the new value.
    Refresh,
    /// Compute only; never read or write.
    Bypass,
}

/// Deterministic key for one (provider, query) pair.
///
/// Every component is percent-encoded before joining, so separators inside
/// terms or filter values cannot make two different queries share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(provider: &ProviderId, query: &Query) -> Self {
        let mut key = String::with_capacity(64);
        key.push_str(&urlencoding::encode(provider.as_str()));
        key.push('|');

        let terms = query
            .keyword()
            .iter()
            .map(|term| urlencoding::encode(term).into_owned())
            .collect::<Vec<_>>();
        key.push_str(&terms.join("+"));

        for (filter, value) in query.filters() {
            key.push('|');
            key.push_str(filter.as_str());
            key.push('=');
            key.push_str(&urlencoding::encode(value));
        }

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live_at(&self, now: Instant) -> bool {
        match self.stored_at.checked_add(self.ttl) {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

#[derive(Debug)]
struct CacheInner<V> {
    map: HashMap<CacheKey, CacheEntry<V>>,
    max_entries: Option<usize>,
}

impl<V: Clone> CacheInner<V> {
    fn get(&self, key: &CacheKey, now: Instant) -> Option<V> {
        self.map
            .get(key)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: CacheKey, value: V, ttl: Duration) -> Result<(), CacheStoreError> {
        let now = Instant::now();
        if let Some(max_entries) = self.max_entries {
            if !self.map.contains_key(&key) && self.map.len() >= max_entries {
                self.clear_expired(now);
                if self.map.len() >= max_entries {
                    return Err(CacheStoreError::CapacityExhausted { max_entries });
                }
            }
        }

        self.map.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
            },
        );
        Ok(())
    }

    fn clear_expired(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live_at(now));
        before - self.map.len()
    }
}

/// Result of a cache-mediated lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<V> {
    pub value: V,
    pub status: CacheStatus,
}

/// Lookup counters since the store was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

type Gate = Arc<AsyncMutex<()>>;

/// Holds a per-key gate and drops it from the map when the last holder
/// leaves, including when the lookup future is cancelled.
struct GateGuard<'a> {
    gates: &'a Mutex<HashMap<CacheKey, Gate>>,
    key: &'a CacheKey,
    gate: Gate,
}

impl<'a> GateGuard<'a> {
    fn acquire<V>(store: &'a CacheStore<V>, key: &'a CacheKey) -> Self {
        let gate = {
            let mut gates = store.gates.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(gates.entry(key.clone()).or_default())
        };
        Self {
            gates: &*store.gates,
            key,
            gate,
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference lives in the map, one is ours; anything more is a waiter.
        if Arc::strong_count(&self.gate) <= 2 {
            gates.remove(self.key);
        }
    }
}

/// Thread-safe cache keyed by [`CacheKey`].
///
/// Clones share the same storage. Expiry is lazy: stale entries are treated
/// as absent on read and only dropped by [`CacheStore::clear_expired`] or when
/// a bounded store needs room.
#[derive(Debug)]
pub struct CacheStore<V> {
    inner: Arc<RwLock<CacheInner<V>>>,
    gates: Arc<Mutex<HashMap<CacheKey, Gate>>>,
    counters: Arc<Counters>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gates: Arc::clone(&self.gates),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V: Clone + Send + Sync> Default for CacheStore<V> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> {
    fn with_capacity_limit(max_entries: Option<usize>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                map: HashMap::new(),
                max_entries,
            })),
            gates: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Store without an entry limit.
    pub fn unbounded() -> Self {
        Self::with_capacity_limit(None)
    }

    /// Store holding at most `max_entries` live entries.
    pub fn bounded(max_entries: usize) -> Self {
        Self::with_capacity_limit(Some(max_entries))
    }

    /// Returns the value for `key` if a live entry exists.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let store = self.inner.read().await;
        store.get(key, Instant::now())
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    pub async fn put(&self, key: CacheKey, value: V, ttl: Duration) -> Result<(), CacheStoreError> {
        let mut store = self.inner.write().await;
        store.put(key, value, ttl)
    }

    /// Returns the cached value, or runs `compute` once and caches its result.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Lookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_compute_with(key, ttl, CacheMode::Use, compute)
            .await
    }

    /// Like [`get_or_compute`](Self::get_or_compute) with an explicit mode.
    ///
    /// Concurrent callers on the same key are serialized on a per-key gate
    /// and re-check the store once they hold it, so a burst of identical
    /// requests runs `compute` once. A failed `compute` is never cached.
    pub async fn get_or_compute_with<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        mode: CacheMode,
        compute: F,
    ) -> Result<Lookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if mode == CacheMode::Bypass {
            let value = compute().await?;
            return Ok(Lookup {
                value,
                status: CacheStatus::Bypassed,
            });
        }

        if mode == CacheMode::Use {
            if let Some(value) = self.get(key).await {
                return Ok(self.hit(key, value));
            }
        }

        let gate = GateGuard::acquire(self, key);
        let _permit = gate.gate.lock().await;
        self.compute_under_gate(key, ttl, mode, compute).await
    }

    async fn compute_under_gate<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        mode: CacheMode,
        compute: F,
    ) -> Result<Lookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if mode == CacheMode::Use {
            if let Some(value) = self.get(key).await {
                return Ok(self.hit(key, value));
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute().await?;

        let status = match self.put(key.clone(), value.clone(), ttl).await {
            Ok(()) if mode == CacheMode::Refresh => CacheStatus::Refreshed,
            Ok(()) => CacheStatus::Miss,
            Err(error) => {
                warn!(key = %key, %error, "cache write rejected; serving uncached value");
                CacheStatus::Degraded
            }
        };
        debug!(key = %key, status = status.as_str(), "cache entry computed");

        Ok(Lookup { value, status })
    }

    fn hit(&self, key: &CacheKey, value: V) -> Lookup<V> {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "cache hit");
        Lookup {
            value,
            status: CacheStatus::Hit,
        }
    }

    /// Removes expired entries and returns how many were dropped.
    pub async fn clear_expired(&self) -> usize {
        let mut store = self.inner.write().await;
        store.clear_expired(Instant::now())
    }

    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.map.clear();
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.map.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}
