//! Error taxonomy for the API client and the normalizer that feeds it.
//!
//! # Design
//! Every failure that leaves `ApiClient` is an `ApiError`, and `ApiError` has
//! exactly four shapes. Callers match on it exhaustively; nothing from the
//! transport or from `serde_json` escapes raw. The original failure is kept as
//! `cause` for diagnostics.
//!
//! `normalize` is pure. Logging a failure is the caller's job (see
//! `crate::call`).

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::http::{HttpResponse, TransportError, TransportErrorKind};

/// The underlying failure behind an `ApiError`.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by every `ApiClient` operation.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response: connection refused, DNS
    /// failure, timeout.
    #[error("transport failure: {cause}")]
    Transport {
        #[source]
        cause: Cause,
    },

    /// A response arrived with a status outside 200..=299. `body` holds the
    /// decoded JSON body when there was one.
    #[error("HTTP {status}")]
    HttpStatus {
        status: u16,
        body: Option<serde_json::Value>,
        #[source]
        cause: Cause,
    },

    /// A successful response whose body could not be decoded.
    #[error("invalid response body: {cause}")]
    Parse {
        #[source]
        cause: Cause,
    },

    /// Anything not classifiable as the above.
    #[error("request failed: {cause}")]
    Unknown {
        #[source]
        cause: Cause,
    },
}

/// Fieldless tag for `ApiError`, handy for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Transport,
    HttpStatus,
    Parse,
    Unknown,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Transport => "transport",
            ApiErrorKind::HttpStatus => "http_status",
            ApiErrorKind::Parse => "parse",
            ApiErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Transport { .. } => ApiErrorKind::Transport,
            ApiError::HttpStatus { .. } => ApiErrorKind::HttpStatus,
            ApiError::Parse { .. } => ApiErrorKind::Parse,
            ApiError::Unknown { .. } => ApiErrorKind::Unknown,
        }
    }

    /// Status code, present only for `HttpStatus`.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded error body, present only for `HttpStatus` when it decoded.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::HttpStatus { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn cause(&self) -> &Cause {
        match self {
            ApiError::Transport { cause }
            | ApiError::HttpStatus { cause, .. }
            | ApiError::Parse { cause }
            | ApiError::Unknown { cause } => cause,
        }
    }
}

/// Cause recorded for `ApiError::HttpStatus`.
#[derive(Debug, Error)]
#[error("server responded with status {status}")]
pub struct UnexpectedStatus {
    pub status: u16,
}

/// Everything that can go wrong between building a request and handing a
/// decoded value back.
#[derive(Debug)]
pub enum Failure {
    /// The transport produced no response.
    Transport(TransportError),
    /// A response with a non-success status.
    Status(HttpResponse),
    /// A success response whose body did not decode.
    Decode(serde_json::Error),
    /// The request body could not be serialized.
    Encode(serde_json::Error),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Classify a failure into an `ApiError`. First match wins:
///
/// 1. a response with a status code becomes `HttpStatus`, with the body
///    decoded best-effort (a body that does not decode is left out),
/// 2. a decode failure on a success response becomes `Parse`,
/// 3. a connect or timeout failure becomes `Transport`,
/// 4. anything else becomes `Unknown`.
pub fn normalize(failure: Failure) -> ApiError {
    match failure {
        Failure::Status(response) => ApiError::HttpStatus {
            status: response.status,
            body: decode_error_body(&response),
            cause: Arc::new(UnexpectedStatus {
                status: response.status,
            }),
        },
        Failure::Decode(err) => ApiError::Parse {
            cause: Arc::new(err),
        },
        Failure::Transport(err) => match err.kind {
            TransportErrorKind::Connect | TransportErrorKind::Timeout => ApiError::Transport {
                cause: Arc::new(err),
            },
            TransportErrorKind::Other => ApiError::Unknown {
                cause: Arc::new(err),
            },
        },
        Failure::Encode(err) => ApiError::Unknown {
            cause: Arc::new(err),
        },
        Failure::Other(err) => ApiError::Unknown { cause: err.into() },
    }
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        normalize(failure)
    }
}

fn decode_error_body(response: &HttpResponse) -> Option<serde_json::Value> {
    if response.is_body_blank() {
        return None;
    }
    serde_json::from_slice(&response.body).ok()
}
