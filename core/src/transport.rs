//! `Transport` implementation over reqwest.
//!
//! Returns every response it receives as data; status interpretation happens
//! in `ApiClient`. Upload file parts are streamed in `UPLOAD_CHUNK` pieces so
//! progress can be reported as the body is consumed.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::config::{ClientConfig, ConfigError};
use crate::http::{
    FilePart, HttpMethod, HttpRequest, HttpResponse, MultipartForm, ProgressCallback, RequestBody,
    Transport, TransportError,
};

pub const UPLOAD_CHUNK: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ConfigError::Transport)?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client, keeping its settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(method(request.method), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            Some(RequestBody::Json(json)) => builder.body(json),
            Some(RequestBody::Multipart(form)) => {
                builder.multipart(multipart(form, request.on_upload_progress)?)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            // A non-2xx status classifies on its own; an unreadable body is left empty.
            Err(err) if !(200..=299).contains(&status) => {
                debug!(status, error = %err, "error body could not be read");
                Bytes::new()
            }
            Err(err) => return Err(classify(err)),
        };

        Ok(HttpResponse::new(status, body))
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(err)
    } else if err.is_connect() {
        TransportError::connect(err)
    } else {
        TransportError::other(err)
    }
}

fn multipart(
    form: MultipartForm,
    progress: Option<ProgressCallback>,
) -> Result<Form, TransportError> {
    let FilePart {
        file_name,
        content_type,
        bytes,
    } = form.file;
    let total = bytes.len() as u64;

    let body = reqwest::Body::wrap_stream(progress_chunks(bytes, progress));
    let mut part = Part::stream_with_length(body, total).file_name(file_name);
    if let Some(content_type) = content_type {
        part = part.mime_str(&content_type).map_err(TransportError::other)?;
    }

    let mut out = Form::new();
    for (name, value) in form.fields {
        out = out.text(name, value);
    }
    Ok(out.part(form.file_field, part))
}

/// Split `bytes` into chunks, reporting cumulative progress as each chunk is
/// pulled from the stream.
fn progress_chunks(
    bytes: Bytes,
    progress: Option<ProgressCallback>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = bytes.len() as u64;
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| bytes.slice(start..(start + UPLOAD_CHUNK).min(bytes.len())))
        .collect();

    let mut transferred = 0u64;
    stream::iter(chunks.into_iter().map(move |chunk| {
        transferred += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress.report(transferred, Some(total));
        }
        Ok(chunk)
    }))
}
