use std::fmt;

use serde_json::Value;

/// A cookie sent with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
  pub name: String,
  pub value: String,
}

impl Cookie {
  pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
    }
  }

  /// Parse a `Cookie` header style list: `a=1; b=2`.
  ///
  /// Pieces without `=` are skipped.
  pub fn parse_list(header: &str) -> Vec<Cookie> {
    header
      .split(';')
      .filter_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| Cookie::new(name, value.trim()))
      })
      .collect()
  }

  /// Render cookies as a single `Cookie` header value.
  pub fn header_value(cookies: &[Cookie]) -> String {
    cookies
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join("; ")
  }
}

impl fmt::Display for Cookie {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}={}", self.name, self.value)
  }
}

/// Request body for POST calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
  /// `application/x-www-form-urlencoded`
  Form(Vec<(String, String)>),
  /// `application/json`
  Json(Value),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_cookie_list() {
    let cookies = Cookie::parse_list("uid=42; username=ann ;token=a=b; broken;  ");
    assert_eq!(
      cookies,
      vec![
        Cookie::new("uid", "42"),
        Cookie::new("username", "ann"),
        Cookie::new("token", "a=b"),
      ]
    );
  }

  #[test]
  fn test_header_value() {
    let cookies = vec![Cookie::new("uid", "42"), Cookie::new("token", "t")];
    assert_eq!(Cookie::header_value(&cookies), "uid=42; token=t");
    assert_eq!(Cookie::header_value(&[]), "");
  }
}
