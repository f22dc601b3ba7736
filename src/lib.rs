//! Caching data-access layer for JSON feed APIs.
//!
//! Requests go through [`api::ApiClient`]. GET data requests are cached in
//! memory by URI for a few minutes; every response is decoded from a
//! `{ "data": ... }` / `{ "message": ... }` envelope, and failures are
//! broadcast through a [`notify::Notifier`] for the UI to display.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;

pub use api::ApiClient;
pub use error::{ApiError, CacheError, TransportError};
pub use notify::{MessageKind, Notification, Notifier};
