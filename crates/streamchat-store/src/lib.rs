//! Conversation store client for streamchat.
//!
//! The durable side of the chat service lives behind a small REST API. This crate
//! wraps it behind the [`ConversationStore`] trait:
//!
//! - `GET /conversations` lists the user's conversations
//! - `POST /conversations` creates one
//! - `DELETE /conversations/{id}` removes one together with its messages
//! - `GET /conversations/{id}/messages?limit=N` returns history, oldest first
//! - `POST /ingest-pdf` uploads a document for retrieval
//!
//! # Example
//!
//! ```no_run
//! use streamchat_core::AccessToken;
//! use streamchat_store::{ConversationStore, HttpStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpStore::new("http://127.0.0.1:8000", AccessToken::new("token"))?;
//!
//! for conversation in store.list_conversations().await? {
//!     println!("{} {}", conversation.id, conversation.display_title());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod types;

pub use error::{Result, StoreError};
pub use http::HttpStore;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use types::IngestReport;

use std::path::Path;

use async_trait::async_trait;
use streamchat_core::{Conversation, ConversationId, Message};

/// Default number of history messages requested when opening a conversation.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// The store trait defining all conversation operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., the REST API, in-memory for testing).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    // =========================================================================
    // Conversation Operations
    // =========================================================================

    /// List the user's conversations.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Create a conversation with the given title.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn create_conversation(&self, title: &str) -> Result<Conversation>;

    /// Delete a conversation and its messages.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the conversation doesn't exist.
    async fn delete_conversation(&self, id: &ConversationId) -> Result<()>;

    // =========================================================================
    // Message Operations
    // =========================================================================

    /// Return up to `limit` messages of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the conversation doesn't exist.
    async fn list_messages(&self, id: &ConversationId, limit: usize) -> Result<Vec<Message>>;

    // =========================================================================
    // Document Operations
    // =========================================================================

    /// Upload a document for ingestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the upload fails.
    async fn ingest_document(&self, path: &Path) -> Result<IngestReport>;
}
