//! HTTP transport types and the `Transport` contract.
//!
//! # Design
//! Requests and responses are plain data. `ApiClient` builds an `HttpRequest`,
//! hands it to a `Transport`, and interprets the returned `HttpResponse`
//! itself: the transport never looks at status codes or bodies. Anything that
//! can issue one HTTP exchange (reqwest, a test fake, a recorded fixture) can
//! sit behind the trait.
//!
//! All fields use owned types so requests can be moved into spawned or boxed
//! futures without lifetime concerns.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by `ApiClient::build_*` methods. Callers may adjust it (extra
/// headers, a per-call timeout) before passing it to `ApiClient::send`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Overrides the transport's default timeout for this request only.
    pub timeout: Option<Duration>,
    pub on_upload_progress: Option<ProgressCallback>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            on_upload_progress: None,
        }
    }

    /// Case-insensitive header lookup; returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Pre-serialized JSON text.
    Json(String),
    Multipart(MultipartForm),
}

/// A multipart form with one binary part and any number of text fields.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    pub file_field: String,
    pub file: FilePart,
    pub fields: Vec<(String, String)>,
}

/// The binary part of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a `Transport` for every response it receives, whatever the
/// status code. The body is kept as raw bytes; decoding is the client's job.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// True when the body is empty or only whitespace.
    pub fn is_body_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// Issues one HTTP exchange.
///
/// Implementations return `Ok` for every response they receive, including
/// 4xx/5xx, and `Err` only when no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// Why a transport could not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset, DNS failure.
    Connect,
    Timeout,
    /// The request could not be built or the body could not be read.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connect => f.write_str("connection failed"),
            TransportErrorKind::Timeout => f.write_str("timed out"),
            TransportErrorKind::Other => f.write_str("transport error"),
        }
    }
}

/// The only failure a `Transport` may report.
#[derive(Debug, Error)]
#[error("{kind}: {source}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn connect(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new(TransportErrorKind::Connect, source)
    }

    pub fn timeout(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new(TransportErrorKind::Timeout, source)
    }

    pub fn other(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new(TransportErrorKind::Other, source)
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// A primitive query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(n) => write!(f, "{n}"),
            QueryValue::Float(n) => write!(f, "{n}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

/// Ordered query parameters. Insertion order is preserved on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query(Vec<(String, QueryValue)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Upload progress
// ---------------------------------------------------------------------------

/// One progress report for a multipart upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    /// 0.0 ..= 100.0
    pub percent: f64,
    pub transferred: u64,
    pub total: Option<u64>,
}

impl UploadProgress {
    pub fn new(transferred: u64, total: Option<u64>) -> Self {
        let percent = match total {
            Some(0) => 100.0,
            Some(total) => (transferred.min(total) as f64 / total as f64) * 100.0,
            None => 0.0,
        };
        Self {
            percent,
            transferred,
            total,
        }
    }
}

/// Shared handle to an upload progress callback.
#[derive(Clone)]
pub struct ProgressCallback(Arc<dyn Fn(UploadProgress) + Send + Sync>);

impl ProgressCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn report(&self, transferred: u64, total: Option<u64>) {
        (self.0)(UploadProgress::new(transferred, total));
    }

    /// Replace this callback with one that stops forwarding once the returned
    /// gate is closed.
    pub(crate) fn gate(&mut self) -> ProgressGate {
        let closed = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&self.0);
        let flag = Arc::clone(&closed);
        self.0 = Arc::new(move |progress: UploadProgress| {
            if !flag.load(Ordering::Acquire) {
                inner(progress);
            }
        });
        ProgressGate(closed)
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressCallback(..)")
    }
}

pub(crate) struct ProgressGate(Arc<AtomicBool>);

impl ProgressGate {
    pub(crate) fn close(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Everything `ApiClient::upload` needs besides the path.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file: FilePart,
    /// Form field carrying the file. Defaults to `"file"`.
    pub field_name: String,
    pub fields: Vec<(String, String)>,
    pub on_progress: Option<ProgressCallback>,
}

impl Upload {
    pub fn new(file: FilePart) -> Self {
        Self {
            file,
            field_name: "file".to_string(),
            fields: Vec::new(),
            on_progress: None,
        }
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(ProgressCallback::new(callback));
        self
    }
}
