//! Error types shared by the cache and request layers.

use thiserror::Error;

/// Failure of a single request made through [`crate::api::ApiClient`].
///
/// Every variant is local to one call; none leaves the cache or the
/// notification channel in an invalid state.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Transport returned an empty body.
  #[error("fetch failed: empty response")]
  EmptyResponse,

  /// Envelope carried a `message` and no `data`.
  #[error("request rejected: {0}")]
  Rejected(String),

  /// Body was not a JSON object.
  #[error("malformed response body: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error(transparent)]
  Cache(#[from] CacheError),
}

/// Errors raised by a [`crate::api::Transport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("transport unavailable: {0}")]
  Unavailable(String),
}

/// Errors raised by the in-memory cache.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache lock poisoned")]
  LockPoisoned,

  /// The background sweep needs a Tokio runtime to be spawned on.
  #[error("no tokio runtime available to run the cache sweep")]
  NoRuntime,
}

impl<T> From<std::sync::PoisonError<T>> for CacheError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    CacheError::LockPoisoned
  }
}
