//! HTTP transport abstraction.
//!
//! The backend is an external collaborator behind the [`HttpClient`] trait:
//! the engine builds [`HttpRequest`] values and consumes [`HttpResponse`]
//! values without knowing whether they came from reqwest or from a test
//! double. No global fetch override, no monkey-patching.

use crate::error::Error;
use bytes::Bytes;
use futures_util::TryStreamExt;
use futures_util::stream::{self, BoxStream};
use serde::de::DeserializeOwned;

/// Header carrying the client-generated deduplication token for mutating
/// requests.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A stream of raw body chunks from the transport.
pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

/// HTTP methods the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request the engine wants executed.
///
/// `path` is relative to the client's base URL and may carry a query string.
/// Cloneable so the session manager can retry the same request once after a
/// token refresh.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Attach a bearer token when one is present; otherwise the request goes
    /// out without an `Authorization` header (the server may still
    /// authenticate by other means, e.g. a cookie the client never inspects).
    pub fn bearer(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.header("Authorization", &format!("Bearer {}", token)),
            None => self,
        }
    }

    /// Value of the first header with the given name, if any.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response body: buffered for JSON endpoints, a chunk stream for SSE.
pub enum HttpBody {
    Buffered(Bytes),
    Stream(ByteStream),
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            HttpBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A response from the transport.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: HttpBody,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the server advertised a structured event-stream body.
    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/event-stream"))
    }

    /// Decode a buffered JSON body.
    ///
    /// A body that fails to decode is a server contract violation and maps to
    /// `Error::Server` with the original status.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, Error> {
        let status = self.status;
        match self.body {
            HttpBody::Buffered(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Server {
                status,
                message: format!("malformed response body: {}", e),
            }),
            HttpBody::Stream(_) => Err(Error::Server {
                status,
                message: "expected a buffered body, got a stream".to_string(),
            }),
        }
    }

    /// Consume the response as a chunk stream. A buffered body becomes a
    /// single-chunk stream so the frame parser has one code path.
    pub fn into_stream(self) -> ByteStream {
        match self.body {
            HttpBody::Buffered(bytes) => Box::pin(stream::iter([Ok(bytes)])),
            HttpBody::Stream(inner) => inner,
        }
    }

    /// Map a non-2xx response to `Error::Server`, pulling a message out of
    /// the body when the server sent one (`{"detail": ...}` or
    /// `{"error": {"message": ...}}`, else raw text).
    pub fn error_for_status(self) -> Result<HttpResponse, Error> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status;
        let message = match self.body {
            HttpBody::Buffered(bytes) => server_message(&bytes),
            HttpBody::Stream(_) => String::new(),
        };
        Err(Error::Server { status, message })
    }
}

/// Best-effort extraction of an error message from a response body.
fn server_message(bytes: &Bytes) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
        if let Some(detail) = value.get("detail").and_then(|v| v.as_str()) {
            return detail.to_string();
        }
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
        {
            return message.to_string();
        }
    }
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Transport interface the engine calls through.
///
/// The production implementation is [`ReqwestHttp`]; tests use a scripted
/// double implementing the same trait.
#[allow(async_fn_in_trait)]
pub trait HttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// reqwest-backed transport.
pub struct ReqwestHttp {
    client: reqwest::Client,
    base_url: url::Url,
}

impl ReqwestHttp {
    /// Build a transport rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        // A trailing slash keeps Url::join from replacing the last path
        // segment of the base.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = url::Url::parse(&normalized)
            .map_err(|e| Error::config(format!("invalid base URL '{}': {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }
}

impl HttpClient for ReqwestHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| Error::config(format!("invalid request path '{}': {}", request.path, e)))?;

        let mut builder = self.client.request(request.method.to_reqwest(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Error::network)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let is_event_stream = content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = if is_event_stream {
            HttpBody::Stream(Box::pin(response.bytes_stream().map_err(Error::network)))
        } else {
            HttpBody::Buffered(response.bytes().await.map_err(Error::network)?)
        };

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
