//! HTTP plumbing the session talks through.
//!
//! The session only needs "send this request, give me status, Set-Cookie
//! headers and body back", so that is all [`Transport`] promises. The default
//! [`UreqTransport`] hands 4xx/5xx responses back as ordinary responses because
//! the restart signal arrives on a 400.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use vocab_core::{VocabError, VocabResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in arrival order.
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> VocabResult<Value> {
        serde_json::from_str(&self.body).map_err(|e| {
            VocabError::Decode(format!("response body is not JSON (status {}): {e}", self.status))
        })
    }
}

pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> VocabResult<HttpResponse>;
}

// ---------------------------------------------------------------------------
// ureq transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// TLS fingerprint the upstream tooling expects. Carried for transports that
    /// can present it.
    pub ja3: Option<String>,
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &TransportConfig) -> Self {
        if config.ja3.as_deref().is_some_and(|s| !s.is_empty()) {
            warn!("ja3 fingerprint configured but the ureq transport cannot present it");
        }
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> VocabResult<HttpResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "http request");

        let mut req = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }

        let result = match &request.body {
            Body::Empty => req.call(),
            Body::Json(value) => req.send_json(value.clone()),
            Body::Form(pairs) => {
                let pairs: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                req.send_form(&pairs)
            }
        };

        let response = match result {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => {
                return Err(VocabError::Transport(format!(
                    "{} {}: {t}",
                    request.method.as_str(),
                    request.url
                )))
            }
        };

        let status = response.status();
        let set_cookies = response
            .all("set-cookie")
            .into_iter()
            .map(str::to_string)
            .collect();
        let body = response
            .into_string()
            .map_err(|e| VocabError::Transport(format!("reading response body: {e}")))?;

        debug!(status, bytes = body.len(), "http response");
        Ok(HttpResponse {
            status,
            set_cookies,
            body,
        })
    }
}
