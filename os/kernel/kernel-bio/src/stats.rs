//! Buffer cache counters for monitoring and debugging.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Lock-free cache counters.
///
/// Updated with relaxed atomics outside of any ordering the cache relies on;
/// values read while the cache is busy are approximate.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups that found the block cached.
    hits: AtomicU64,
    /// Lookups that had to bind a slot.
    misses: AtomicU64,
    /// Misses that recycled a slot still bound to another block.
    evictions: AtomicU64,
    /// Slots moved between shards.
    steals: AtomicU64,
    /// Device reads issued.
    reads: AtomicU64,
    /// Device writes issued.
    writes: AtomicU64,
}

impl CacheStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            steals: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_steal(&self) {
        self.steals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn steals(&self) -> u64 {
        self.steals.load(Ordering::Relaxed)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total lookups, hits plus misses.
    pub fn lookups(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.steals.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bcache {{ hits: {}, misses: {}, evictions: {}, steals: {}, reads: {}, writes: {} }}",
            self.hits(),
            self.misses(),
            self.evictions(),
            self.steals(),
            self.reads(),
            self.writes()
        )
    }
}
