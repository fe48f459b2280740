//! Turns a fallible API call into a `Result` value, reporting failures once.
//!
//! # Design
//! `Call` is where transport-level errors become domain errors. It runs the
//! wrapped future, applies an optional success mapper, applies an optional
//! error mapper to the `ApiError`, hands the (possibly mapped) error to an
//! `ErrorSink` exactly once, and returns. It never panics on failure and
//! never logs a success.

use std::error::Error;
use std::future::Future;

use crate::error::ApiError;

/// Receives every failed call exactly once.
pub trait ErrorSink {
    fn log(&self, error: &(dyn Error + 'static));
}

impl<F> ErrorSink for F
where
    F: Fn(&(dyn Error + 'static)),
{
    fn log(&self, error: &(dyn Error + 'static)) {
        self(error)
    }
}

/// Emits one `tracing` error event per failure, with the source chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn log(&self, error: &(dyn Error + 'static)) {
        tracing::error!(error = %error, chain = %source_chain(error), "api call failed");
    }
}

/// `"a: b: c"` for an error `a` caused by `b` caused by `c`, excluding `a`.
pub fn source_chain(error: &(dyn Error + 'static)) -> String {
    let mut parts = Vec::new();
    let mut next = error.source();
    while let Some(err) = next {
        parts.push(err.to_string());
        next = err.source();
    }
    parts.join(": ")
}

/// A pending call plus its success and error mappers.
///
/// ```ignore
/// let post: Result<Post, PostError> = Call::new(client.get::<PostResponse>("todos/1", None))
///     .map(Post::from)
///     .map_err(|e| PostError::from_api("1", e))
///     .run(&TracingErrorSink)
///     .await;
/// ```
#[must_use = "a Call does nothing until `run` is awaited"]
pub struct Call<Fut, M, E> {
    future: Fut,
    map: M,
    error: E,
}

impl<Fut, Raw> Call<Fut, fn(Raw) -> Raw, fn(ApiError) -> ApiError>
where
    Fut: Future<Output = Result<Raw, ApiError>>,
{
    pub fn new(future: Fut) -> Self {
        Self {
            future,
            map: std::convert::identity,
            error: std::convert::identity,
        }
    }
}

impl<Fut, M, E> Call<Fut, M, E> {
    pub fn map<M2>(self, map: M2) -> Call<Fut, M2, E> {
        Call {
            future: self.future,
            map,
            error: self.error,
        }
    }

    pub fn map_err<E2>(self, error: E2) -> Call<Fut, M, E2> {
        Call {
            future: self.future,
            map: self.map,
            error,
        }
    }

    pub async fn run<Raw, Mapped, Fail>(self, sink: &dyn ErrorSink) -> Result<Mapped, Fail>
    where
        Fut: Future<Output = Result<Raw, ApiError>>,
        M: FnOnce(Raw) -> Mapped,
        E: FnOnce(ApiError) -> Fail,
        Fail: Error + 'static,
    {
        match self.future.await {
            Ok(raw) => Ok((self.map)(raw)),
            Err(api_error) => {
                let error = (self.error)(api_error);
                sink.log(&error);
                Err(error)
            }
        }
    }
}

/// `Call::new(future).run(sink)` for calls that need no mapping.
pub async fn call<Raw, Fut>(sink: &dyn ErrorSink, future: Fut) -> Result<Raw, ApiError>
where
    Fut: Future<Output = Result<Raw, ApiError>>,
{
    Call::new(future).run(sink).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{normalize, ApiErrorKind, Failure};
    use crate::http::HttpResponse;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink(RefCell<Vec<String>>);

    impl ErrorSink for RecordingSink {
        fn log(&self, error: &(dyn Error + 'static)) {
            self.0.borrow_mut().push(error.to_string());
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fetch post failed")]
    struct FetchPostFailed(#[source] ApiError);

    fn not_found() -> ApiError {
        normalize(Failure::Status(HttpResponse::new(404, r#"{"message":"not found"}"#)))
    }

    #[tokio::test]
    async fn success_is_mapped_and_not_logged() {
        let sink = RecordingSink::default();
        let result = Call::new(async { Ok::<_, ApiError>(serde_json::json!({"id": "1"})) })
            .map(|raw: serde_json::Value| raw["id"].as_str().unwrap_or_default().to_string())
            .run(&sink)
            .await;
        assert_eq!(result.unwrap(), "1");
        assert!(sink.0.borrow().is_empty());
    }

    #[tokio::test]
    async fn failure_passes_api_error_through_and_logs_once() {
        let sink = RecordingSink::default();
        let result: Result<(), ApiError> = call(&sink, async { Err(not_found()) }).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::HttpStatus);
        assert_eq!(*sink.0.borrow(), vec!["HTTP 404".to_string()]);
    }

    #[tokio::test]
    async fn error_mapper_narrows_and_keeps_original_reachable() {
        let sink = RecordingSink::default();
        let result = Call::new(async { Err::<(), _>(not_found()) })
            .map_err(FetchPostFailed)
            .run(&sink)
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.0.status(), Some(404));
        let source = err.source().unwrap().downcast_ref::<ApiError>().unwrap();
        assert_eq!(source.kind(), ApiErrorKind::HttpStatus);
        assert_eq!(*sink.0.borrow(), vec!["fetch post failed".to_string()]);
    }

    #[tokio::test]
    async fn closures_are_sinks() {
        let logged = RefCell::new(0);
        let sink = |_: &(dyn Error + 'static)| *logged.borrow_mut() += 1;
        let _ = call::<(), _>(&sink, async { Err(not_found()) }).await;
        assert_eq!(*logged.borrow(), 1);
    }

    #[test]
    fn source_chain_walks_every_cause() {
        let err = FetchPostFailed(not_found());
        assert_eq!(
            source_chain(&err),
            "HTTP 404: server responded with status 404"
        );
    }
}
