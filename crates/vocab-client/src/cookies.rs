//! Session cookie tracking.
//!
//! The server rotates its session and load-balancer cookies on nearly every
//! response. Only the names in [`ALLOWED_COOKIES`] are kept and replayed; any
//! tracking cookies it sets are dropped.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use vocab_core::{VocabError, VocabResult};

/// Session id, load-balancer affinity (plus its CORS twin), guid and the
/// anti-bot challenge token.
pub const ALLOWED_COOKIES: [&str; 5] = ["AWSALB", "AWSALBCORS", "JSESSIONID", "guid", "__cf_bm"];

pub fn is_allowed(name: &str) -> bool {
    ALLOWED_COOKIES.contains(&name)
}

pub use cookie::SameSite;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Unix timestamp of the `Expires` attribute.
    pub expires: Option<i64>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Parse one `Set-Cookie` header value. Malformed headers yield `None`.
    pub fn parse(header: &str) -> Option<Self> {
        let parsed = match cookie::Cookie::parse(header) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "ignoring malformed Set-Cookie header");
                return None;
            }
        };
        Some(Self {
            name: parsed.name().to_string(),
            value: parsed.value().trim_matches('"').to_string(),
            domain: parsed.domain().map(str::to_string),
            path: parsed.path().map(str::to_string),
            expires: parsed.expires_datetime().map(|t| t.unix_timestamp()),
            max_age: parsed.max_age().map(|d| d.whole_seconds()),
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            same_site: parsed.same_site(),
        })
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Retained cookie set, ordered by name so rendering is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial jar from configured `(name, value)` pairs. Empty
    /// values and names outside [`ALLOWED_COOKIES`] are skipped.
    pub fn seed<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let cookies = pairs
            .into_iter()
            .filter(|(name, value)| is_allowed(name) && !value.is_empty())
            .map(|(name, value)| (name.to_string(), Cookie::new(name, value)))
            .collect();
        Self { cookies }
    }

    /// Return a copy of this jar with the allow-listed server cookies applied.
    pub fn merge(&self, server: &[Cookie]) -> CookieJar {
        let mut cookies = self.cookies.clone();
        for cookie in server.iter().filter(|c| is_allowed(&c.name)) {
            cookies.insert(cookie.name.clone(), cookie.clone());
        }
        CookieJar { cookies }
    }

    /// Parse raw `Set-Cookie` values and merge them.
    pub fn merge_headers(&self, set_cookies: &[String]) -> CookieJar {
        let parsed: Vec<Cookie> = set_cookies.iter().filter_map(|h| Cookie::parse(h)).collect();
        self.merge(&parsed)
    }

    /// Render as a `Cookie` header value: `name=value;` pairs in name order.
    pub fn render(&self) -> VocabResult<String> {
        if self.cookies.is_empty() {
            return Err(VocabError::NoCookies);
        }
        Ok(self
            .cookies
            .values()
            .map(|c| format!("{c};"))
            .collect())
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
