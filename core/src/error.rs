//! Error types for the REST data-access layer.
//!
//! # Design
//! A single `ApiError` enum covers every failure the core can report. `Http`
//! carries the server's status and decoded body so callers can inspect
//! validation messages; the remaining variants are shape, configuration and
//! usage defects detected locally. Nothing here is retried or swallowed.

use std::fmt;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by codecs, walkers, gateways and connections.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with status >= 400.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: HttpBody },

    /// A payload did not have the JSON shape the codec required.
    #[error("unexpected payload shape: {0}")]
    Shape(String),

    /// A paginated response had neither an envelope nor a bare record shape.
    #[error("malformed page: {0}")]
    MalformedPage(String),

    /// The gateway or connection is missing something the operation needs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation is disabled on this gateway variant.
    #[error("operation `{operation}` is not permitted on `{resource}`")]
    OperationNotPermitted {
        operation: &'static str,
        resource: String,
    },

    /// The transport could not complete the exchange.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// Status code of an `Http` error, `None` for every other variant.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Decoded body of an error response.
///
/// JSON bodies are parsed, text bodies kept as strings and anything else
/// left as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for HttpBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpBody::Json(value) => write!(f, "{value}"),
            HttpBody::Text(text) => write!(f, "{text}"),
            HttpBody::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}
