//! Error types for the store client.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The token was refused.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The API returned another error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the `detail` field.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The API base URL cannot be parsed.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// The token cannot be carried in a header.
    #[error("invalid access token")]
    InvalidToken,

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
