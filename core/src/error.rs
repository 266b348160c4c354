//! Error types for the EasyPost client.
//!
//! # Design
//! Every resource operation returns `Result<T, ApiError>`. The variants follow
//! the order in which a call can fail: configuration is checked before any
//! request is built, input preconditions before dispatch, transport failures
//! during the round-trip, and decode/remote failures while reading the body.
//! HTTP status codes are not inspected; the service reports failures through
//! an `error` field in the body, which lands in `Remote`.

use thiserror::Error;

/// Result alias used by every fallible function in this crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by `EasyPostClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client is not usable as configured, e.g. the API key is empty.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A local precondition failed before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request could not be delivered or the response had no body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not parse as the expected shape. `body` holds
    /// the raw response for diagnosis.
    #[error("decode error: {message}")]
    Decode { message: String, body: String },

    /// The response parsed but carried a non-empty `error` field.
    #[error("remote error: {0}")]
    Remote(String),
}

impl ApiError {
    pub(crate) fn decode(err: impl std::fmt::Display, body: &str) -> Self {
        ApiError::Decode {
            message: err.to_string(),
            body: body.to_string(),
        }
    }
}
