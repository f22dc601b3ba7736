//! Sibling invalidation for paginated requests.
//!
//! When a URI is cached for the first time and its path-and-query contains
//! `page=`, the text from `page=` to the end becomes a prefix. Every other
//! cached key whose path-and-query *starts with* that prefix is dropped.
//!
//! The match is anchored at offset 0 of the other key's path-and-query. For
//! ordinary `http(s)` URIs the path-and-query always begins with `/`, so
//! the rule only fires against keys whose path-and-query itself begins with
//! `page=` (opaque URIs such as `feed:page=2`). This narrow behaviour is kept
//! as-is and pinned by the tests below.

use url::{Position, Url};

const PAGE_MARKER: &str = "page=";

/// The path-and-query component of a URI, e.g. `/v6/feed?page=2&x=1`.
///
/// The fragment is not part of it.
pub fn path_and_query(uri: &Url) -> &str {
  &uri[Position::BeforePath..Position::AfterQuery]
}

/// Invalidation prefix taken from a freshly written URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePrefix(String);

impl PagePrefix {
  /// Extract the prefix, or `None` when the URI is not paginated.
  pub fn of(uri: &Url) -> Option<Self> {
    let pq = path_and_query(uri);
    pq.find(PAGE_MARKER).map(|start| Self(pq[start..].to_string()))
  }

  /// Whether `key`'s path-and-query starts with this prefix.
  pub fn matches(&self, key: &Url) -> bool {
    path_and_query(key).starts_with(&self.0)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Keys other than `written` that a first write of `written` invalidates.
pub fn stale_siblings<'a, I>(written: &Url, keys: I) -> Vec<Url>
where
  I: IntoIterator<Item = &'a Url>,
{
  let Some(prefix) = PagePrefix::of(written) else {
    return Vec::new();
  };

  keys
    .into_iter()
    .filter(|key| *key != written && prefix.matches(key))
    .cloned()
    .collect()
}
