//! # Resolution Cache
//!
//! Bounded memo of resolved methods keyed by [`MethodId`].
//!
//! Resolving a method walks its metadata several times (synthesis links,
//! parameters, generic arguments), and the same method shows up in many
//! traces. This cache keeps the result around so repeated frames only pay
//! for a map lookup.
//!
//! ## Retention
//!
//! The map stores [`Weak`] references. Strong references live in a FIFO
//! recency queue capped at `capacity`, plus whatever documents still hold the
//! value. Once a value falls out of the queue and no frame references it, the
//! next lookup recomputes it. A recomputed value is always freshly built from
//! metadata, never a stale entry for another key.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use demyst_core::cache::ResolutionCache;
//! use demyst_core::types::MethodId;
//!
//! let cache: ResolutionCache<String> = ResolutionCache::new(16);
//! let value = cache.get_or_compute(MethodId::new(7), |id| Arc::new(format!("method {id}")));
//! assert_eq!(value.as_str(), "method 0x00000007");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tracing::trace;

use crate::error::DemystResult;
use crate::types::MethodId;

/// Default number of strongly retained values.
pub const DEFAULT_CAPACITY: usize = 256;

/// Identity-keyed cache with weak map entries and a bounded recency queue.
///
/// ## Thread Safety
///
/// All methods take `&self`; share the cache behind an `Arc`. Computation
/// runs outside of any lock, so two threads missing on the same key may both
/// compute. The first insert wins and both callers receive a complete value.
#[derive(Debug)]
pub struct ResolutionCache<V>
{
    capacity: usize,
    entries: RwLock<HashMap<MethodId, Weak<V>>>,
    recent: Mutex<VecDeque<Arc<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> Default for ResolutionCache<V>
{
    fn default() -> Self
    {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V> ResolutionCache<V>
{
    /// Create a cache retaining at most `capacity` values strongly.
    ///
    /// A capacity of zero is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self
    {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(HashMap::new()),
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Maximum number of strongly retained values.
    pub fn capacity(&self) -> usize
    {
        self.capacity
    }

    /// Return the live value for `key`, computing and storing it on a miss.
    pub fn get_or_compute<F>(&self, key: MethodId, compute: F) -> Arc<V>
    where
        F: FnOnce(MethodId) -> Arc<V>,
    {
        if let Some(value) = self.lookup(key) {
            return value;
        }
        self.insert(key, compute(key))
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute).
    ///
    /// ## Errors
    ///
    /// Returns the error produced by `compute`. Nothing is stored in that case,
    /// so the next call for the same key computes again.
    pub fn get_or_try_compute<F>(&self, key: MethodId, compute: F) -> DemystResult<Arc<V>>
    where
        F: FnOnce(MethodId) -> DemystResult<Arc<V>>,
    {
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }
        let value = compute(key)?;
        Ok(self.insert(key, value))
    }

    /// Live value for `key`, without computing.
    pub fn get(&self, key: MethodId) -> Option<Arc<V>>
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .and_then(Weak::upgrade)
    }

    /// Number of map entries, including ones whose value has been dropped.
    pub fn len(&self) -> usize
    {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    /// Number of values currently held by the recency queue.
    pub fn retained(&self) -> usize
    {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64)
    {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    /// Drop every entry and retained value.
    pub fn clear(&self)
    {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.recent.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn lookup(&self, key: MethodId) -> Option<Arc<V>>
    {
        let found = self.get(key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(method = %key, "resolution cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(method = %key, "resolution cache miss");
        }
        found
    }

    fn insert(&self, key: MethodId, value: Arc<V>) -> Arc<V>
    {
        let value = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

            // Another thread may have finished first; keep its value.
            if let Some(existing) = entries.get(&key).and_then(Weak::upgrade) {
                return existing;
            }

            entries.insert(key, Arc::downgrade(&value));
            if entries.len() > self.capacity.saturating_mul(2) {
                entries.retain(|_, weak| weak.strong_count() > 0);
            }
            value
        };

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.push_back(Arc::clone(&value));
        while recent.len() > self.capacity {
            recent.pop_front();
        }
        value
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::DemystError;

    #[test]
    fn test_hit_returns_same_value()
    {
        let cache: ResolutionCache<String> = ResolutionCache::new(4);
        let calls = AtomicUsize::new(0);
        let compute = |id: MethodId| {
            calls.fetch_add(1, Ordering::SeqCst);
            Arc::new(id.to_string())
        };

        let first = cache.get_or_compute(MethodId::new(1), compute);
        let second = cache.get_or_compute(MethodId::new(1), compute);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_failed_compute_is_not_cached()
    {
        let cache: ResolutionCache<String> = ResolutionCache::new(4);
        let key = MethodId::new(9);

        let failed = cache.get_or_try_compute(key, |id| Err(DemystError::resolution(id, "stripped")));
        assert!(failed.is_err());
        assert!(cache.get(key).is_none());

        let retried = cache.get_or_try_compute(key, |_| Ok(Arc::new("ok".to_string())));
        assert_eq!(retried.unwrap().as_str(), "ok");
    }

    #[test]
    fn test_recency_queue_is_bounded()
    {
        let cache: ResolutionCache<u64> = ResolutionCache::new(3);
        for key in 0..10u64 {
            cache.get_or_compute(MethodId::new(key), |id| Arc::new(id.value() * 2));
        }

        assert_eq!(cache.retained(), 3);
        // Evicted keys no longer have a live value but still compute correctly.
        assert!(cache.get(MethodId::new(0)).is_none());
        let recomputed = cache.get_or_compute(MethodId::new(0), |id| Arc::new(id.value() * 2));
        assert_eq!(*recomputed, 0);
        assert_eq!(*cache.get_or_compute(MethodId::new(9), |_| Arc::new(u64::MAX)), 18);
    }

    #[test]
    fn test_values_held_elsewhere_survive_eviction()
    {
        let cache: ResolutionCache<u64> = ResolutionCache::new(1);
        let held = cache.get_or_compute(MethodId::new(1), |_| Arc::new(1));
        cache.get_or_compute(MethodId::new(2), |_| Arc::new(2));

        let again = cache.get_or_compute(MethodId::new(1), |_| Arc::new(100));
        assert!(Arc::ptr_eq(&held, &again));
    }

    #[test]
    fn test_dead_entries_are_pruned()
    {
        let cache: ResolutionCache<u64> = ResolutionCache::new(2);
        for key in 0..50u64 {
            cache.get_or_compute(MethodId::new(key), |id| Arc::new(id.value()));
        }
        assert!(cache.len() <= 5);
    }
}
