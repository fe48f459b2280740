//! Verb-shaped HTTP client over a pluggable `Transport`.
//!
//! # Design
//! `ApiClient` holds an immutable `ClientConfig` and the transport handle; it
//! carries no mutable state between calls. Each verb is split into a pure
//! `build_*` method that produces an `HttpRequest` and the shared
//! `parse_response` step that consumes an `HttpResponse`. `send` joins the two
//! around one transport call, so callers that need per-call headers or a
//! timeout can build, adjust, and send.
//!
//! Every failure is routed through `error::normalize`; the verb operations
//! return `ApiError` and nothing else.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::{ClientConfig, ConfigError};
use crate::error::{normalize, ApiError, Failure};
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, MultipartForm, Query, RequestBody, Transport, Upload,
};
use crate::transport::ReqwestTransport;

/// Typed HTTP client. Construct once and share it with every consumer.
#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    config: ClientConfig,
    transport: T,
}

impl ApiClient<ReqwestTransport> {
    /// Client backed by reqwest, using the configured timeout.
    pub fn from_config(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(config, transport))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -- build ---------------------------------------------------------------

    pub fn build_get(&self, path: &str, query: Option<&Query>) -> HttpRequest {
        let mut request = self.request(HttpMethod::Get, path);
        if let Some(query) = query {
            request.query = query.to_pairs();
        }
        request
    }

    pub fn build_post<B>(&self, path: &str, body: Option<&B>) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.build_with_body(HttpMethod::Post, path, body)
    }

    pub fn build_put<B>(&self, path: &str, body: Option<&B>) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.build_with_body(HttpMethod::Put, path, body)
    }

    pub fn build_patch<B>(&self, path: &str, body: Option<&B>) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.build_with_body(HttpMethod::Patch, path, body)
    }

    pub fn build_delete(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, path)
    }

    /// Multipart POST. The default `Content-Type` header is left off so the
    /// transport can set the multipart boundary.
    pub fn build_upload(&self, path: &str, upload: Upload) -> HttpRequest {
        let mut request = self.request(HttpMethod::Post, path);
        request
            .headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        request.body = Some(RequestBody::Multipart(MultipartForm {
            file_field: upload.field_name,
            file: upload.file,
            fields: upload.fields,
        }));
        request.on_upload_progress = upload.on_progress;
        request
    }

    // -- send ----------------------------------------------------------------

    /// Run one prepared request and decode its body as `R`.
    pub async fn send<R: DeserializeOwned>(&self, mut request: HttpRequest) -> Result<R, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let gate = request.on_upload_progress.as_mut().map(|cb| cb.gate());

        let outcome = self.transport.execute(request).await;
        if let Some(gate) = gate {
            gate.close();
        }

        let response = outcome.map_err(|err| normalize(Failure::Transport(err)))?;
        debug!(status = response.status, "received response");
        parse_response(response)
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&Query>,
    ) -> Result<R, ApiError> {
        self.send(self.build_get(path, query)).await
    }

    pub async fn post<B, R>(&self, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(self.build_post(path, body)?).await
    }

    pub async fn put<B, R>(&self, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(self.build_put(path, body)?).await
    }

    pub async fn patch<B, R>(&self, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(self.build_patch(path, body)?).await
    }

    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.send(self.build_delete(path)).await
    }

    pub async fn upload<R: DeserializeOwned>(
        &self,
        path: &str,
        upload: Upload,
    ) -> Result<R, ApiError> {
        self.send(self.build_upload(path, upload)).await
    }

    // -- helpers -------------------------------------------------------------

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, self.config.url_for(path));
        request.headers = self.config.default_headers.clone();
        request
    }

    fn build_with_body<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(|e| normalize(Failure::Encode(e)))?;
            request.body = Some(RequestBody::Json(json));
        }
        Ok(request)
    }
}

/// Decode a 2xx body as `R`; classify anything else.
///
/// An empty success body decodes as JSON `null`, so `()` and `Option<_>`
/// targets accept `204 No Content`.
pub fn parse_response<R: DeserializeOwned>(response: HttpResponse) -> Result<R, ApiError> {
    if !response.is_success() {
        return Err(normalize(Failure::Status(response)));
    }
    let body: &[u8] = if response.is_body_blank() {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(body).map_err(|e| normalize(Failure::Decode(e)))
}
