//! Typed HTTP call layer with request-state tracking.
//!
//! # Overview
//! `ApiClient` issues verb-shaped calls through a pluggable `Transport` and
//! turns every failure into one `ApiError`. `Call` converts those calls into
//! `Result` values, narrows errors into domain types, and reports each failure
//! to an `ErrorSink` once. `RequestController` tracks the lifecycle of one
//! logical operation with single-flight execution and success/error
//! listeners.
//!
//! # Design
//! - `ApiClient` is stateless between calls; its config and transport are
//!   fixed at construction and it is passed explicitly to its consumers.
//! - Each verb is split into `build_*` (produces an `HttpRequest`) and a shared
//!   `parse_response` step, so the I/O boundary stays explicit and testable.
//! - `RequestController` targets a single-threaded cooperative executor:
//!   `Rc`/`RefCell`, no locks, state never borrowed across an `.await`.

pub mod call;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod posts;
pub mod transport;

pub use call::{call, Call, ErrorSink, TracingErrorSink};
pub use client::{parse_response, ApiClient};
pub use config::{ClientConfig, ConfigError};
pub use controller::{
    RequestController, RequestState, RequestStatus, Scope, StateHandle, Subscription,
};
pub use error::{normalize, ApiError, ApiErrorKind, Failure};
pub use http::{
    FilePart, HttpMethod, HttpRequest, HttpResponse, ProgressCallback, Query, QueryValue,
    RequestBody, Transport, TransportError, TransportErrorKind, Upload, UploadProgress,
};
pub use posts::{fetch_post, Post, PostError};
pub use transport::ReqwestTransport;
