//! LRU render cache with per-key request coalescing

use lru::LruCache;
use serde::Serialize;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use super::single_flight::{Claim, SingleFlight};
use crate::errors::{RenderError, RenderResult};
use crate::models::{CacheEntry, CacheKey};

type SharedResult = RenderResult<Arc<CacheEntry>>;

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests served from a stored entry
    pub hits: u64,
    /// Requests that ran the producer
    pub misses: u64,
    /// Requests that waited on another request's render
    pub coalesced: u64,
    pub evictions: u64,
    /// Renders that returned an error
    pub failures: u64,
    pub entries: usize,
    pub capacity: usize,
    pub in_flight: usize,
}

/// How `get_or_render` obtained its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// Served from a stored entry
    Hit,
    /// This caller ran the producer
    Rendered,
    /// Another caller's render was shared
    Coalesced,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Rendered => "rendered",
            Self::Coalesced => "coalesced",
        }
    }
}

impl std::fmt::Display for CacheLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct CacheInner {
    entries: Mutex<LruCache<CacheKey, Arc<CacheEntry>>>,
    flights: SingleFlight<CacheKey, SharedResult>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
    failures: AtomicU64,
}

impl CacheInner {
    /// Never held across an await; a poisoned lock still guards consistent data
    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.lock().get(key).cloned()
    }

    /// Must run before the flight for `key` completes, so a caller that
    /// misses the flight finds the entry instead
    fn store(&self, key: &CacheKey, result: &SharedResult) {
        match result {
            Ok(entry) => {
                let evicted = self.lock().push(key.clone(), Arc::clone(entry));
                if let Some((evicted, _)) = evicted
                    && &evicted != key
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    trace!("Evicted {} from render cache", evicted);
                }
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Render for {} failed: {}", key, e);
            }
        }
    }
}

/// Bounded in-memory cache of rendered images
///
/// Cloning is cheap and every clone shares the same storage. For a given key
/// at most one producer runs at a time; concurrent callers wait for its result
/// instead of rendering again. Failures reach every waiter but are not stored,
/// so the next request for the key tries again.
#[derive(Clone)]
pub struct RenderCache {
    inner: Arc<CacheInner>,
}

impl RenderCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(LruCache::new(capacity)),
                flights: SingleFlight::new(),
                capacity,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Return the entry for `key`, running `produce` if nobody has it yet
    ///
    /// If the caller that is producing the entry is cancelled, one of the
    /// waiting callers takes over and produces it instead.
    pub async fn get_or_render<F, Fut>(&self, key: &CacheKey, produce: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RenderResult<CacheEntry>>,
    {
        self.lookup_or_render(key, produce)
            .await
            .map(|(entry, _)| entry)
    }

    /// [`get_or_render`](Self::get_or_render), also reporting how the entry
    /// was obtained
    pub async fn lookup_or_render<F, Fut>(
        &self,
        key: &CacheKey,
        produce: F,
    ) -> RenderResult<(Arc<CacheEntry>, CacheLookup)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RenderResult<CacheEntry>>,
    {
        let inner = &*self.inner;
        let mut produce = Some(produce);

        loop {
            if let Some(entry) = inner.lookup(key) {
                inner.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Render cache hit for {}", key);
                return Ok((entry, CacheLookup::Hit));
            }

            match inner.flights.claim(key) {
                Claim::Follower(follower) => {
                    trace!("Waiting on in-flight render for {}", key);
                    match follower.wait().await {
                        Some(result) => {
                            inner.coalesced.fetch_add(1, Ordering::Relaxed);
                            return result.map(|entry| (entry, CacheLookup::Coalesced));
                        }
                        None => {
                            debug!("In-flight render for {} was abandoned, retrying", key);
                        }
                    }
                }
                Claim::Leader(leader) => {
                    // A flight that finished between the lookup and the claim
                    // has already stored its entry
                    if let Some(entry) = inner.lookup(key) {
                        inner.hits.fetch_add(1, Ordering::Relaxed);
                        leader.complete(Ok(Arc::clone(&entry)));
                        return Ok((entry, CacheLookup::Hit));
                    }

                    inner.misses.fetch_add(1, Ordering::Relaxed);
                    let Some(produce) = produce.take() else {
                        return Err(RenderError::worker("render producer already consumed"));
                    };
                    let result = produce().await.map(Arc::new);
                    inner.store(key, &result);
                    leader.complete(result.clone());
                    return result.map(|entry| (entry, CacheLookup::Rendered));
                }
            }
        }
    }

    /// Look up `key`, promoting it to most recently used
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.inner.lookup(key);
        if entry.is_some() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.inner.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.inner.capacity.get(),
            in_flight: self.inner.flights.len(),
        }
    }
}
