//! Error types for the billing API client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." All other non-2xx responses land in `HttpError` with the raw
//! status code and body for debugging.
//!
//! Errors are stored inside shared query state and handed to every observer
//! of a key, so the type is `Clone` and carries messages rather than source
//! errors.

use thiserror::Error;

/// Errors returned by the client, transports, fetchers and mutation helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    /// True for failures that happened on the wire rather than while
    /// encoding or decoding JSON.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound | ApiError::HttpError { .. } | ApiError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}
