//! Bounded, expiring registry of per-endpoint trackers.
//!
//! # Responsibilities
//! - Hand out the tracker for an endpoint key, creating it lazily
//! - Evict by LRU pressure when over capacity
//! - Evict by TTL when an entry has not been touched recently
//!
//! Evicted trackers are simply dropped; dispatcher events still in flight
//! hold their own `Arc` and release the tracker when processed.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::tracker::{LatencyTracker, TrackerOptions};

struct Entry {
    tracker: Arc<LatencyTracker>,
    last_access: Instant,
}

/// LRU + TTL map from endpoint key to its tracker.
///
/// All locking is internal; callers never synchronize around it.
pub struct TrackerRegistry {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
    options: TrackerOptions,
}

impl TrackerRegistry {
    pub fn new(capacity: usize, ttl: Duration, options: TrackerOptions) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            options,
        }
    }

    /// Fetch the tracker for `key`, creating one if absent or expired.
    ///
    /// An expired entry is replaced in place: the stale tracker's statistics
    /// describe traffic the endpoint stopped seeing minutes ago.
    pub fn get(&self, key: &str) -> Arc<LatencyTracker> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.get_mut(key) {
            if now.duration_since(entry.last_access) <= self.ttl {
                entry.last_access = now;
                return Arc::clone(&entry.tracker);
            }
            let fresh = Arc::new(LatencyTracker::new(self.options));
            entry.tracker = Arc::clone(&fresh);
            entry.last_access = now;
            return fresh;
        }

        let tracker = Arc::new(LatencyTracker::new(self.options));
        inner.push(
            key.to_owned(),
            Entry {
                tracker: Arc::clone(&tracker),
                last_access: now,
            },
        );
        tracker
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every entry whose last access is older than the TTL. Called by
    /// the periodic reporter so idle endpoints release their memory without
    /// waiting for LRU pressure.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let mut evicted = 0;
        // Oldest entries sit at the LRU end; pop while they are expired.
        while let Some((_, entry)) = inner.peek_lru() {
            if now.duration_since(entry.last_access) <= self.ttl {
                break;
            }
            inner.pop_lru();
            evicted += 1;
        }
        evicted
    }
}
