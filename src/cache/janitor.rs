//! Background sweep that drops idle cache entries.
//!
//! The sweep runs every `period`, first firing one `period` after spawn, and
//! removes entries untouched for longer than `idle`. With the default of two
//! minutes for both, an entry lives between two and four minutes after its
//! last use depending on where it falls in the sweep cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::CacheStats;
use crate::error::CacheError;

/// Handle to a running sweep task. Dropping it stops the task.
pub struct Janitor {
  handle: Option<JoinHandle<()>>,
  shutdown: Option<oneshot::Sender<()>>,
}

impl Janitor {
  /// Start sweeping `storage` on the current Tokio runtime.
  pub fn spawn<S: CacheStorage>(
    storage: Arc<S>,
    stats: Arc<CacheStats>,
    period: Duration,
    idle: Duration,
  ) -> Result<Self, CacheError> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
    let (tx, mut rx) = oneshot::channel();

    let handle = runtime.spawn(async move {
      let mut interval = time::interval_at(Instant::now() + period, period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = &mut rx => break,
          _ = interval.tick() => {
            sweep(storage.as_ref(), &stats, idle);
          }
        }
      }
      debug!("cache sweep stopped");
    });

    debug!(?period, ?idle, "cache sweep started");
    Ok(Self {
      handle: Some(handle),
      shutdown: Some(tx),
    })
  }

  /// Stop the sweep and wait for the task to finish.
  pub async fn shutdown(mut self) {
    if let Some(tx) = self.shutdown.take() {
      let _ = tx.send(());
    }
    if let Some(handle) = self.handle.take() {
      let _ = handle.await;
    }
  }
}

impl Drop for Janitor {
  fn drop(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
    }
  }
}

/// Run one sweep. Returns the number of entries removed.
pub(crate) fn sweep<S: CacheStorage + ?Sized>(storage: &S, stats: &CacheStats, idle: Duration) -> usize {
  match storage.evict_idle(idle) {
    Ok(evicted) => {
      if !evicted.is_empty() {
        stats.record_evictions(evicted.len());
        debug!(count = evicted.len(), "evicted idle cache entries");
      }
      evicted.len()
    }
    Err(e) => {
      warn!(error = %e, "cache sweep failed");
      0
    }
  }
}
