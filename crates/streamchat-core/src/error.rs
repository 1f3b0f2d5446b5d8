//! Common error types for streamchat.
//!
//! This module provides shared error types that are used across multiple crates.

use crate::ids::ConversationId;
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the streamchat client.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A conversation with the specified ID was not found.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
