//! In-app notification fan-out.
//!
//! A [`Notifier`] is a registry of handlers. Publishing a notification calls
//! every handler registered at that moment, synchronously and in registration
//! order. Nothing is stored: a handler registered after a publish never sees it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{trace, warn};

/// Kind of a user-facing status message.
///
/// Only [`MessageKind::Message`] is produced by this crate. The `NoMore*`
/// kinds are end-of-list signals raised by list views and carried through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
  /// Generic text, usually an error from the server or the transport
  Message,
  NoMore,
  NoMoreReply,
  NoMoreLikeUser,
  NoMoreShare,
  NoMoreHotReply,
}

impl fmt::Display for MessageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Message => "message",
      Self::NoMore => "no-more",
      Self::NoMoreReply => "no-more-reply",
      Self::NoMoreLikeUser => "no-more-like-user",
      Self::NoMoreShare => "no-more-share",
      Self::NoMoreHotReply => "no-more-hot-reply",
    };
    f.write_str(name)
  }
}

/// A `(kind, message)` pair delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub kind: MessageKind,
  pub message: String,
}

/// Handle returned by [`Notifier::subscribe`], used to detach a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Multi-subscriber notification channel.
#[derive(Default)]
pub struct Notifier {
  next_id: AtomicU64,
  handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
}

impl Notifier {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a handler. It receives every notification published from now on.
  pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
  where
    F: Fn(&Notification) + Send + Sync + 'static,
  {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self
      .handlers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push((id, Arc::new(handler)));
    id
  }

  /// Remove a handler. Returns `false` if it was already gone.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
    let before = handlers.len();
    handlers.retain(|(existing, _)| *existing != id);
    handlers.len() != before
  }

  /// Number of registered handlers.
  pub fn subscriber_count(&self) -> usize {
    self.handlers.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Deliver a notification to every current subscriber.
  ///
  /// Handlers run outside the registry lock, so a handler may subscribe or
  /// unsubscribe. A panicking handler is logged and skipped; the remaining
  /// handlers still run. Returns the number of handlers that completed.
  pub fn publish(&self, kind: MessageKind, message: impl Into<String>) -> usize {
    let notification = Notification {
      kind,
      message: message.into(),
    };

    // Snapshot so delivery never holds the lock
    let handlers: Vec<Handler> = self
      .handlers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(_, handler)| Arc::clone(handler))
      .collect();

    trace!(%kind, message = %notification.message, subscribers = handlers.len(), "publishing notification");

    let mut delivered = 0;
    for handler in handlers {
      match panic::catch_unwind(AssertUnwindSafe(|| handler(&notification))) {
        Ok(()) => delivered += 1,
        Err(_) => warn!(%kind, "notification handler panicked"),
      }
    }
    delivered
  }
}

impl fmt::Debug for Notifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Notifier")
      .field("subscribers", &self.subscriber_count())
      .finish_non_exhaustive()
  }
}
