//! Decoding of the `{ "data": ... } | { "message": ... }` response envelope.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::notify::{MessageKind, Notifier};

/// Text published when a response is empty or unreadable.
pub const FETCH_FAILED: &str = "fetch failed";

/// Decoded shape of a response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
  /// `data` present; its value may be JSON `null`
  Data(Value),
  /// `data` absent and `message` present
  Message(String),
  /// Neither field present
  Empty,
}

impl Envelope {
  /// Parse a body. Pure: no notification is published.
  ///
  /// Anything other than a JSON object is an error.
  pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
    let mut object: Map<String, Value> = serde_json::from_str(body)?;

    if let Some(data) = object.remove("data") {
      return Ok(Self::Data(data));
    }

    Ok(match object.remove("message") {
      Some(Value::String(text)) => Self::Message(text),
      Some(Value::Null) => Self::Message(String::new()),
      Some(other) => Self::Message(other.to_string()),
      None => Self::Empty,
    })
  }
}

/// Decode a body into its payload, publishing user-facing failures.
///
/// - `data` present: `Ok(Some(value))`, including `Some(Value::Null)`
/// - only `message` present: publishes the message, returns [`ApiError::Rejected`]
/// - neither: `Ok(None)` with nothing published
/// - not a JSON object: publishes [`FETCH_FAILED`], returns [`ApiError::Malformed`]
pub fn decode(body: &str, notifier: &Notifier) -> Result<Option<Value>, ApiError> {
  match Envelope::parse(body) {
    Ok(Envelope::Data(data)) => Ok(Some(data)),
    Ok(Envelope::Empty) => Ok(None),
    Ok(Envelope::Message(message)) => {
      debug!(%message, "server rejected request");
      notifier.publish(MessageKind::Message, message.clone());
      Err(ApiError::Rejected(message))
    }
    Err(e) => {
      debug!(error = %e, "malformed response body");
      notifier.publish(MessageKind::Message, FETCH_FAILED);
      Err(ApiError::Malformed(e))
    }
  }
}
