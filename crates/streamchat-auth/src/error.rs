//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while obtaining a credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The email/password pair was refused.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The request was refused for another client-side reason (e.g. email taken).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the `detail` field.
        message: String,
    },

    /// The server failed to process the request.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the `detail` field, if any.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not a token.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The form was rejected before any request was made.
    #[error("{0}")]
    Validation(String),
}

impl AuthError {
    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Http(_))
    }
}
