//! In-memory response cache keyed by request URI.
//!
//! This module provides:
//! - A mutex-guarded store of raw response bodies with last-touched timestamps
//! - A background sweep that drops entries left idle past a threshold
//! - Sibling invalidation for paginated requests on first write of a key
//! - A cache-first fetch path that never holds the lock across network I/O

mod invalidate;
mod janitor;
mod layer;
mod storage;
mod traits;

pub use invalidate::{path_and_query, PagePrefix};
pub use janitor::Janitor;
pub use layer::{CacheLayer, CacheSettings, DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL};
pub use storage::{CacheStorage, Committed, MemoryStorage, NoopStorage};
pub use traits::{CacheEntry, CacheResult, CacheSource, CacheStats, CacheStatsSnapshot, Write};
