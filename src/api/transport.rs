use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, USER_AGENT};
use tracing::{debug, warn};
use url::Url;

use super::types::{Content, Cookie};
use crate::error::TransportError;

const REQUESTED_WITH: &str = "X-Requested-With";

/// The HTTP capability the request client calls into.
///
/// An empty string is a valid return value; callers decide whether that is
/// a failure.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn post(&self, uri: &Url, content: &Content, cookies: &[Cookie]) -> Result<String, TransportError>;

  /// GET with an `X-Requested-With` header, for HTML and other raw pages.
  async fn get_html(&self, uri: &Url, cookies: &[Cookie], requested_with: &str) -> Result<String, TransportError>;

  /// Plain GET of a JSON API resource.
  async fn get_string(&self, uri: &Url, cookies: &[Cookie]) -> Result<String, TransportError>;
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
  pub user_agent: String,
  pub timeout: Duration,
}

impl Default for HttpSettings {
  fn default() -> Self {
    Self {
      user_agent: concat!("feedwire/", env!("CARGO_PKG_VERSION")).to_string(),
      timeout: Duration::from_secs(30),
    }
  }
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  user_agent: String,
}

impl HttpTransport {
  pub fn new(settings: &HttpSettings) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(settings.timeout)
      .gzip(true)
      .deflate(true)
      .build()?;

    Ok(Self {
      client,
      user_agent: settings.user_agent.clone(),
    })
  }

  fn request(&self, method: reqwest::Method, uri: &Url, cookies: &[Cookie]) -> reqwest::RequestBuilder {
    let builder = self
      .client
      .request(method, uri.clone())
      .header(USER_AGENT, &self.user_agent);

    if cookies.is_empty() {
      builder
    } else {
      builder.header(COOKIE, Cookie::header_value(cookies))
    }
  }

  /// Send and read the body as text.
  ///
  /// A non-success status is not an error: the body is returned as-is, even
  /// when empty, since the server reports most failures inside the envelope.
  async fn send(&self, builder: reqwest::RequestBuilder, uri: &Url) -> Result<String, TransportError> {
    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
      warn!(%uri, status = status.as_u16(), bytes = text.len(), "non-success status");
    }

    debug!(%uri, status = status.as_u16(), bytes = text.len(), "response received");
    Ok(text)
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn post(&self, uri: &Url, content: &Content, cookies: &[Cookie]) -> Result<String, TransportError> {
    let builder = self.request(reqwest::Method::POST, uri, cookies);
    let builder = match content {
      Content::Form(pairs) => builder.form(pairs),
      Content::Json(value) => builder.json(value),
    };
    self.send(builder, uri).await
  }

  async fn get_html(&self, uri: &Url, cookies: &[Cookie], requested_with: &str) -> Result<String, TransportError> {
    let builder = self
      .request(reqwest::Method::GET, uri, cookies)
      .header(REQUESTED_WITH, requested_with);
    self.send(builder, uri).await
  }

  async fn get_string(&self, uri: &Url, cookies: &[Cookie]) -> Result<String, TransportError> {
    let builder = self.request(reqwest::Method::GET, uri, cookies);
    self.send(builder, uri).await
  }
}
