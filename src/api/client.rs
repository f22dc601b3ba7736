//! Request client that ties the transport, the response cache and the
//! envelope decoder together.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::envelope::{self, FETCH_FAILED};
use super::transport::Transport;
use super::types::{Content, Cookie};
use crate::cache::{CacheLayer, CacheStorage, MemoryStorage};
use crate::error::{ApiError, TransportError};
use crate::notify::{MessageKind, Notification, Notifier, SubscriptionId};

/// Client with transparent caching for GET data requests.
///
/// POST calls and raw-text calls always go to the network and are never
/// cached. [`ApiClient::get_data`] is the only cached path.
pub struct ApiClient<T: Transport, S: CacheStorage = MemoryStorage> {
  transport: Arc<T>,
  cache: CacheLayer<S>,
  notifier: Arc<Notifier>,
}

impl<T: Transport, S: CacheStorage> ApiClient<T, S> {
  pub fn new(transport: T, cache: CacheLayer<S>, notifier: Arc<Notifier>) -> Self {
    Self {
      transport: Arc::new(transport),
      cache,
      notifier,
    }
  }

  /// Register a handler for user-facing notifications.
  pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
  where
    F: Fn(&Notification) + Send + Sync + 'static,
  {
    self.notifier.subscribe(handler)
  }

  pub fn notifier(&self) -> &Arc<Notifier> {
    &self.notifier
  }

  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// POST and return the raw response text (not cached).
  pub async fn post_text(&self, uri: &Url, content: &Content, cookies: &[Cookie]) -> Result<String, ApiError> {
    let text = self
      .transport
      .post(uri, content, cookies)
      .await
      .inspect_err(|e| self.fetch_failed(uri, e))?;
    self.non_empty(uri, text)
  }

  /// GET with an `X-Requested-With` header and return the raw text (not cached).
  pub async fn get_text(&self, uri: &Url, cookies: &[Cookie], requested_with: &str) -> Result<String, ApiError> {
    let text = self
      .transport
      .get_html(uri, cookies, requested_with)
      .await
      .inspect_err(|e| self.fetch_failed(uri, e))?;
    self.non_empty(uri, text)
  }

  /// POST and decode the response envelope (not cached).
  pub async fn post_data(&self, uri: &Url, content: &Content, cookies: &[Cookie]) -> Result<Option<Value>, ApiError> {
    let text = self
      .transport
      .post(uri, content, cookies)
      .await
      .inspect_err(|e| self.fetch_failed(uri, e))?;
    envelope::decode(&text, &self.notifier)
  }

  /// GET through the cache and decode the response envelope.
  ///
  /// With `force_refresh` unset, a cached body is returned (and re-stamped)
  /// without touching the network. Otherwise the body is fetched and written
  /// back, even when it is empty or carries a failure message.
  pub async fn get_data(&self, uri: &Url, force_refresh: bool, cookies: &[Cookie]) -> Result<Option<Value>, ApiError> {
    let result = self
      .cache
      .fetch(uri, force_refresh, || async move {
        self
          .transport
          .get_string(uri, cookies)
          .await
          .inspect_err(|e| self.fetch_failed(uri, e))
      })
      .await?;

    debug!(%uri, source = ?result.source, "decoding response");
    envelope::decode(&result.data, &self.notifier)
  }

  /// Stop the cache's idle sweep. Other clones of this client keep it alive.
  pub async fn shutdown(self) {
    self.cache.shutdown().await;
  }

  fn fetch_failed(&self, uri: &Url, error: &TransportError) {
    warn!(%uri, %error, "request failed");
    self.notifier.publish(MessageKind::Message, FETCH_FAILED);
  }

  fn non_empty(&self, uri: &Url, text: String) -> Result<String, ApiError> {
    if text.is_empty() {
      debug!(%uri, "empty response");
      self.notifier.publish(MessageKind::Message, FETCH_FAILED);
      return Err(ApiError::EmptyResponse);
    }
    Ok(text)
  }
}

impl<T: Transport, S: CacheStorage> Clone for ApiClient<T, S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      cache: self.cache.clone(),
      notifier: Arc::clone(&self.notifier),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSettings, CacheStorage};
  use crate::error::TransportError;
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::time::Duration;

  /// Transport that answers every request with the same body and counts calls.
  #[derive(Default)]
  struct FakeTransport {
    body: String,
    delay: Option<Duration>,
    unavailable: bool,
    calls: AtomicUsize,
    requested_with: Mutex<Option<String>>,
  }

  impl FakeTransport {
    fn answering(body: &str) -> Self {
      Self {
        body: body.to_string(),
        ..Default::default()
      }
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<String, TransportError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(delay) = self.delay {
        tokio::time::sleep(delay).await;
      }
      if self.unavailable {
        return Err(TransportError::Unavailable("connection refused".into()));
      }
      Ok(self.body.clone())
    }
  }

  #[async_trait]
  impl Transport for FakeTransport {
    async fn post(&self, _uri: &Url, _content: &Content, _cookies: &[Cookie]) -> Result<String, TransportError> {
      self.respond().await
    }

    async fn get_html(&self, _uri: &Url, _cookies: &[Cookie], requested_with: &str) -> Result<String, TransportError> {
      *self.requested_with.lock().unwrap() = Some(requested_with.to_string());
      self.respond().await
    }

    async fn get_string(&self, _uri: &Url, _cookies: &[Cookie]) -> Result<String, TransportError> {
      self.respond().await
    }
  }

  fn client(transport: FakeTransport) -> (ApiClient<FakeTransport>, Arc<Mutex<Vec<Notification>>>) {
    let cache = CacheLayer::new(MemoryStorage::new(), CacheSettings::default()).unwrap();
    let client = ApiClient::new(transport, cache, Arc::new(Notifier::new()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.subscribe(move |n| sink.lock().unwrap().push(n.clone()));
    (client, seen)
  }

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  fn form() -> Content {
    Content::Form(vec![("message".into(), "hi".into())])
  }

  #[tokio::test]
  async fn test_get_data_second_call_uses_cache() {
    let (client, _) = client(FakeTransport::answering(r#"{"data": {"x": 1}}"#));
    let uri = url("https://api.example.com/v6/feed/detail?id=1");

    let first = client.get_data(&uri, false, &[]).await.unwrap();
    let second = client.get_data(&uri, false, &[]).await.unwrap();

    assert_eq!(first, Some(json!({"x": 1})));
    assert_eq!(second, first);
    assert_eq!(client.transport().calls(), 1);
  }

  #[tokio::test]
  async fn test_get_data_force_refresh_always_fetches() {
    let (client, _) = client(FakeTransport::answering(r#"{"data": []}"#));
    let uri = url("https://api.example.com/v6/main/indexV8?page=1");

    for _ in 0..3 {
      client.get_data(&uri, true, &[]).await.unwrap();
    }
    assert_eq!(client.transport().calls(), 3);
    assert_eq!(client.cache().storage().len().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_get_data_message_is_cached_and_notified_each_time() {
    let (client, seen) = client(FakeTransport::answering(r#"{"message": "请先登录"}"#));
    let uri = url("https://api.example.com/v6/notification/list?page=1");

    for _ in 0..2 {
      let err = client.get_data(&uri, false, &[]).await.unwrap_err();
      assert!(matches!(err, ApiError::Rejected(_)));
    }

    assert_eq!(client.transport().calls(), 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|n| n.message == "请先登录"));
  }

  #[tokio::test]
  async fn test_get_data_empty_body_is_cached_then_fails_to_decode() {
    let (client, seen) = client(FakeTransport::answering(""));
    let uri = url("https://api.example.com/v6/user/space?uid=1");

    let err = client.get_data(&uri, false, &[]).await.unwrap_err();

    assert!(matches!(err, ApiError::Malformed(_)));
    assert_eq!(client.cache().storage().get(&uri).unwrap().as_deref(), Some(""));
    assert_eq!(seen.lock().unwrap()[0].message, FETCH_FAILED);
  }

  #[tokio::test]
  async fn test_get_data_empty_object_has_no_payload() {
    let (client, seen) = client(FakeTransport::answering("{}"));
    let uri = url("https://api.example.com/v6/misc/ping");

    assert_eq!(client.get_data(&uri, false, &[]).await.unwrap(), None);
    assert!(seen.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_transport_error_propagates_and_notifies() {
    let (client, seen) = client(FakeTransport {
      unavailable: true,
      ..Default::default()
    });
    let uri = url("https://api.example.com/v6/feed/detail?id=9");

    let err = client.get_data(&uri, false, &[]).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(TransportError::Unavailable(_))));
    assert!(!client.cache().storage().contains(&uri).unwrap());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, MessageKind::Message);
    assert_eq!(seen[0].message, FETCH_FAILED);
  }

  #[tokio::test]
  async fn test_transport_error_on_uncached_paths_notifies_each_call() {
    let (client, seen) = client(FakeTransport {
      unavailable: true,
      ..Default::default()
    });
    let uri = url("https://api.example.com/v6/feed/reply?id=9");

    let err = client.post_text(&uri, &form(), &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    let err = client.get_text(&uri, &[], "XMLHttpRequest").await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    let err = client.post_data(&uri, &form(), &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|n| n.message == FETCH_FAILED));
  }

  #[tokio::test]
  async fn test_post_text_returns_raw_body_uncached() {
    let (client, _) = client(FakeTransport::answering("<html>ok</html>"));
    let uri = url("https://api.example.com/v6/feed/reply?id=3");

    let text = client.post_text(&uri, &form(), &[]).await.unwrap();
    client.post_text(&uri, &form(), &[]).await.unwrap();

    assert_eq!(text, "<html>ok</html>");
    assert_eq!(client.transport().calls(), 2);
    assert_eq!(client.cache().storage().len().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_empty_text_publishes_fetch_failed() {
    let (client, seen) = client(FakeTransport::answering(""));
    let uri = url("https://www.example.com/feed/123");

    let err = client.get_text(&uri, &[], "XMLHttpRequest").await.unwrap_err();
    assert!(matches!(err, ApiError::EmptyResponse));

    let err = client.post_text(&uri, &form(), &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::EmptyResponse));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|n| n.kind == MessageKind::Message && n.message == FETCH_FAILED));
  }

  #[tokio::test]
  async fn test_get_text_passes_requested_with() {
    let (client, _) = client(FakeTransport::answering("<p>page</p>"));
    let uri = url("https://www.example.com/feed/123");

    let text = client.get_text(&uri, &[], "com.example.app").await.unwrap();

    assert_eq!(text, "<p>page</p>");
    assert_eq!(
      client.transport().requested_with.lock().unwrap().as_deref(),
      Some("com.example.app")
    );
    assert_eq!(client.cache().storage().len().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_post_data_decodes_without_caching() {
    let (client, seen) = client(FakeTransport::answering(r#"{"message": "失败"}"#));
    let uri = url("https://api.example.com/v6/feed/like?id=4");

    let err = client.post_data(&uri, &form(), &[]).await.unwrap_err();

    assert!(matches!(err, ApiError::Rejected(ref m) if m == "失败"));
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(client.cache().storage().len().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_new_page_invalidates_anchored_siblings_only() {
    let (client, _) = client(FakeTransport::answering(r#"{"data": []}"#));
    let storage = client.cache().storage();
    let anchored = url("feed:page=2&x=1");
    let http_sibling = url("https://api.example.com/v6/list?page=2&x=1&lastItem=7");
    storage.put(&anchored, "{}".into()).unwrap();
    storage.put(&http_sibling, "{}".into()).unwrap();

    client
      .get_data(&url("https://api.example.com/v6/list?page=2&x=1"), false, &[])
      .await
      .unwrap();

    assert!(!storage.contains(&anchored).unwrap());
    assert!(storage.contains(&http_sibling).unwrap());
  }

  #[tokio::test]
  async fn test_refreshing_existing_key_does_not_invalidate() {
    let (client, _) = client(FakeTransport::answering(r#"{"data": []}"#));
    let uri = url("https://api.example.com/v6/list?page=2&x=1");
    client.get_data(&uri, false, &[]).await.unwrap();

    let anchored = url("feed:page=2&x=1");
    client.cache().storage().put(&anchored, "{}".into()).unwrap();
    client.get_data(&uri, true, &[]).await.unwrap();

    assert!(client.cache().storage().contains(&anchored).unwrap());
  }

  /// Concurrent misses for one key are not coalesced: both reach the
  /// transport, both commit, and one entry remains.
  #[tokio::test]
  async fn test_concurrent_misses_are_not_deduplicated() {
    let (client, _) = client(FakeTransport {
      body: r#"{"data": {"n": 1}}"#.into(),
      delay: Some(Duration::from_millis(10)),
      ..Default::default()
    });
    let uri = url("https://api.example.com/v6/feed/detail?id=5");

    let (a, b) = tokio::join!(
      client.get_data(&uri, false, &[]),
      client.get_data(&uri, false, &[]),
    );

    assert_eq!(a.unwrap(), Some(json!({"n": 1})));
    assert_eq!(b.unwrap(), Some(json!({"n": 1})));
    assert_eq!(client.transport().calls(), 2);
    assert_eq!(client.cache().storage().keys().unwrap(), vec![uri]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_idle_entry_is_refetched_after_sweep() {
    let (client, _) = client(FakeTransport::answering(r#"{"data": 1}"#));
    let uri = url("https://api.example.com/v6/main/init");

    client.get_data(&uri, false, &[]).await.unwrap();
    tokio::time::sleep(Duration::from_secs(90)).await;
    client.get_data(&uri, false, &[]).await.unwrap();
    assert_eq!(client.transport().calls(), 1);

    // Last touched at 90s; the sweep at 240s finds it idle for 150s
    tokio::time::sleep(Duration::from_secs(151)).await;
    client.get_data(&uri, false, &[]).await.unwrap();
    assert_eq!(client.transport().calls(), 2);
  }
}
