//! Cache layer that orchestrates caching logic with network fetching.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use super::janitor::Janitor;
use super::storage::CacheStorage;
use super::traits::{CacheResult, CacheStats, CacheStatsSnapshot, Write};
use crate::error::{ApiError, CacheError, TransportError};

/// Default sweep period and idle threshold.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timing knobs for the idle sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
  /// How often the sweep runs
  pub sweep_interval: Duration,
  /// How long an entry may go untouched before the sweep drops it
  pub idle_timeout: Duration,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      sweep_interval: DEFAULT_SWEEP_INTERVAL,
      idle_timeout: DEFAULT_IDLE_TIMEOUT,
    }
  }
}

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the request client and the transport. The
/// storage lock is only ever held for map operations; the fetcher runs with
/// no lock held.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  stats: Arc<CacheStats>,
  janitor: Arc<Janitor>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer and start its idle sweep.
  ///
  /// Must be called from within a Tokio runtime.
  pub fn new(storage: S, settings: CacheSettings) -> Result<Self, CacheError> {
    let storage = Arc::new(storage);
    let stats = Arc::new(CacheStats::default());
    let janitor = Janitor::spawn(
      Arc::clone(&storage),
      Arc::clone(&stats),
      settings.sweep_interval,
      settings.idle_timeout,
    )?;

    Ok(Self {
      storage,
      stats,
      janitor: Arc::new(janitor),
    })
  }

  /// Fetch a body with cache-first strategy.
  ///
  /// 1. Unless `force_refresh`, read-and-touch the cached body and return it
  /// 2. Otherwise call `fetcher` with no lock held
  /// 3. Commit the result: a new key invalidates its paginated siblings, an
  ///    existing key is overwritten and re-stamped
  ///
  /// The membership check and the commit are separate critical sections, so
  /// two concurrent misses for one key both reach the network. Both commits
  /// are applied; the last one to take the lock wins.
  pub async fn fetch<F, Fut>(
    &self,
    uri: &Url,
    force_refresh: bool,
    fetcher: F,
  ) -> Result<CacheResult<String>, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, TransportError>>,
  {
    if !force_refresh {
      if let Some(body) = self.storage.read(uri)? {
        self.stats.record_hit();
        debug!(%uri, "cache hit");
        return Ok(CacheResult::from_cache(body));
      }
      self.stats.record_miss();
      debug!(%uri, "cache miss");
    }

    let body = fetcher().await?;

    let committed = self.storage.commit(uri, body.clone())?;
    match committed.write {
      Write::Inserted => debug!(%uri, "cached new response"),
      Write::Replaced => debug!(%uri, "refreshed cached response"),
    }
    if !committed.invalidated.is_empty() {
      self.stats.record_invalidations(committed.invalidated.len());
      debug!(%uri, count = committed.invalidated.len(), "invalidated paginated siblings");
    }

    Ok(CacheResult::from_network(body))
  }

  /// Drop every cached entry.
  pub fn clear(&self) -> Result<usize, CacheError> {
    self.storage.clear()
  }

  pub fn stats(&self) -> Result<CacheStatsSnapshot, CacheError> {
    Ok(self.stats.snapshot(self.storage.len()?))
  }

  /// Direct access to the underlying storage.
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Stop the idle sweep if this is the last handle to it.
  pub async fn shutdown(self) {
    if let Ok(janitor) = Arc::try_unwrap(self.janitor) {
      janitor.shutdown().await;
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stats: Arc::clone(&self.stats),
      janitor: Arc::clone(&self.janitor),
    }
  }
}
