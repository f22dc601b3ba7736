//! Request client, response envelope decoding and the HTTP transport.

mod client;
mod envelope;
mod transport;
mod types;

pub use client::ApiClient;
pub use envelope::{decode, Envelope, FETCH_FAILED};
pub use transport::{HttpSettings, HttpTransport, Transport};
pub use types::{Content, Cookie};
