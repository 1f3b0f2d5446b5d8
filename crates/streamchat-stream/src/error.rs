//! Connection error types.

use thiserror::Error;

/// A result type using `ConnectionError`.
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors raised by dialers and connection tasks.
///
/// These never cross the controller boundary; the controller turns them into a
/// `Closed` connection status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The configured endpoint cannot be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The transport failed while connecting, reading or writing.
    #[error("transport error: {0}")]
    Transport(String),
}
