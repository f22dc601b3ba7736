//! Cache storage trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use super::invalidate;
use super::traits::{CacheEntry, Write};
use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Outcome of [`CacheStorage::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
  pub write: Write,
  /// Sibling keys dropped by the paginated-prefix rule
  pub invalidated: Vec<Url>,
}

/// Trait for cache storage backends.
///
/// Every method completes with in-memory work only; implementations must
/// never perform I/O while holding their lock.
pub trait CacheStorage: Send + Sync + 'static {
  /// Get the body for `uri` without refreshing its timestamp.
  fn get(&self, uri: &Url) -> Result<Option<String>>;

  /// Get the body for `uri` and refresh its timestamp in the same step.
  fn read(&self, uri: &Url) -> Result<Option<String>>;

  fn contains(&self, uri: &Url) -> Result<bool>;

  /// Create or overwrite the entry for `uri`, stamping the current time.
  fn put(&self, uri: &Url, body: String) -> Result<Write>;

  /// Write a freshly fetched body.
  ///
  /// Overwriting an existing key only re-stamps it. Inserting a new key also
  /// removes its paginated siblings (see [`invalidate`]) under the same lock.
  fn commit(&self, uri: &Url, body: String) -> Result<Committed>;

  /// Refresh the timestamp of `uri`. Returns `false` on a miss.
  fn touch(&self, uri: &Url) -> Result<bool>;

  fn delete(&self, uri: &Url) -> Result<bool>;

  /// Snapshot of every cached key.
  fn keys(&self) -> Result<Vec<Url>>;

  /// Remove every entry untouched for longer than `idle`.
  fn evict_idle(&self, idle: Duration) -> Result<Vec<Url>>;

  /// Remove everything. Returns the number of entries dropped.
  fn clear(&self) -> Result<usize>;

  fn len(&self) -> Result<usize>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - every read misses, every write is dropped.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _uri: &Url) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn read(&self, _uri: &Url) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn contains(&self, _uri: &Url) -> Result<bool> {
    Ok(false)
  }

  fn put(&self, _uri: &Url, _body: String) -> Result<Write> {
    Ok(Write::Inserted) // Discard
  }

  fn commit(&self, _uri: &Url, _body: String) -> Result<Committed> {
    Ok(Committed {
      write: Write::Inserted,
      invalidated: Vec::new(),
    })
  }

  fn touch(&self, _uri: &Url) -> Result<bool> {
    Ok(false)
  }

  fn delete(&self, _uri: &Url) -> Result<bool> {
    Ok(false)
  }

  fn keys(&self) -> Result<Vec<Url>> {
    Ok(Vec::new())
  }

  fn evict_idle(&self, _idle: Duration) -> Result<Vec<Url>> {
    Ok(Vec::new())
  }

  fn clear(&self) -> Result<usize> {
    Ok(0)
  }

  fn len(&self) -> Result<usize> {
    Ok(0)
  }
}

/// URI-keyed response store guarded by a single mutex.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<Url, CacheEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, uri: &Url) -> Result<Option<String>> {
    let entries = self.entries.lock()?;
    Ok(entries.get(uri).map(|entry| entry.body.clone()))
  }

  fn read(&self, uri: &Url) -> Result<Option<String>> {
    let mut entries = self.entries.lock()?;
    Ok(entries.get_mut(uri).map(|entry| {
      entry.last_touched = Instant::now();
      entry.body.clone()
    }))
  }

  fn contains(&self, uri: &Url) -> Result<bool> {
    Ok(self.entries.lock()?.contains_key(uri))
  }

  fn put(&self, uri: &Url, body: String) -> Result<Write> {
    let mut entries = self.entries.lock()?;
    let write = match entries.insert(uri.clone(), CacheEntry::new(body)) {
      Some(_) => Write::Replaced,
      None => Write::Inserted,
    };
    Ok(write)
  }

  fn commit(&self, uri: &Url, body: String) -> Result<Committed> {
    let mut entries = self.entries.lock()?;

    if let Some(entry) = entries.get_mut(uri) {
      *entry = CacheEntry::new(body);
      return Ok(Committed {
        write: Write::Replaced,
        invalidated: Vec::new(),
      });
    }

    let invalidated = invalidate::stale_siblings(uri, entries.keys());
    for key in &invalidated {
      entries.remove(key);
    }
    entries.insert(uri.clone(), CacheEntry::new(body));

    Ok(Committed {
      write: Write::Inserted,
      invalidated,
    })
  }

  fn touch(&self, uri: &Url) -> Result<bool> {
    let mut entries = self.entries.lock()?;
    match entries.get_mut(uri) {
      Some(entry) => {
        entry.last_touched = Instant::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn delete(&self, uri: &Url) -> Result<bool> {
    Ok(self.entries.lock()?.remove(uri).is_some())
  }

  fn keys(&self) -> Result<Vec<Url>> {
    Ok(self.entries.lock()?.keys().cloned().collect())
  }

  fn evict_idle(&self, idle: Duration) -> Result<Vec<Url>> {
    let mut entries = self.entries.lock()?;
    let now = Instant::now();

    let expired: Vec<Url> = entries
      .iter()
      .filter(|(_, entry)| entry.is_idle(now, idle))
      .map(|(key, _)| key.clone())
      .collect();

    for key in &expired {
      entries.remove(key);
    }
    Ok(expired)
  }

  fn clear(&self) -> Result<usize> {
    let mut entries = self.entries.lock()?;
    let count = entries.len();
    entries.clear();
    Ok(count)
  }

  fn len(&self) -> Result<usize> {
    Ok(self.entries.lock()?.len())
  }
}
