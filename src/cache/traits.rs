//! Core types for the response cache.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

/// One cached response body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  /// Raw response text, stored verbatim
  pub body: String,
  /// Creation time or most recent read/refresh
  pub last_touched: Instant,
}

impl CacheEntry {
  pub fn new(body: String) -> Self {
    Self {
      body,
      last_touched: Instant::now(),
    }
  }

  /// Whether the entry has gone untouched for longer than `idle` as of `now`.
  pub fn is_idle(&self, now: Instant, idle: std::time::Duration) -> bool {
    now.saturating_duration_since(self.last_touched) > idle
  }
}

/// Outcome of writing a body into storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
  /// The key was not cached before
  Inserted,
  /// An existing entry was overwritten and re-stamped
  Replaced,
}

/// Result from a cache operation, including data and where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }
}

/// Indicates where a body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Served from the in-memory cache
  Cache,
}

/// Cache counters, updated atomically from request paths and the sweep.
#[derive(Debug, Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
  evictions: AtomicU64,
  invalidations: AtomicU64,
}

impl CacheStats {
  pub(crate) fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_evictions(&self, count: usize) {
    self.evictions.fetch_add(count as u64, Ordering::Relaxed);
  }

  pub(crate) fn record_invalidations(&self, count: usize) {
    self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
  }

  /// Point-in-time copy of the counters alongside the current entry count.
  pub fn snapshot(&self, entries: usize) -> CacheStatsSnapshot {
    CacheStatsSnapshot {
      entries,
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      evictions: self.evictions.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
    }
  }
}

/// Snapshot returned by [`CacheStats::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
  pub entries: usize,
  pub hits: u64,
  pub misses: u64,
  /// Entries removed by the idle sweep
  pub evictions: u64,
  /// Entries removed as stale paginated siblings
  pub invalidations: u64,
}
