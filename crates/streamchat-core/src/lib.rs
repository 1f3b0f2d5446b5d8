//! Core types for streamchat.
//!
//! This crate provides the foundational types shared by every streamchat crate:
//!
//! - **Identifiers**: the opaque, server-assigned [`ConversationId`]
//! - **Domain types**: conversations, messages and the bearer [`AccessToken`]
//! - **Error types**: common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use streamchat_core::{ConversationId, Message, Role};
//!
//! // Ids arrive as integers from the reference server but are kept opaque.
//! let id: ConversationId = serde_json::from_str("42").unwrap();
//! assert_eq!(id.as_str(), "42");
//!
//! let message = Message::user("hello");
//! assert_eq!(message.role, Role::User);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod types;

pub use error::{CoreError, Result};
pub use ids::{ConversationId, IdError};
pub use types::{AccessToken, Conversation, ErrorBody, Message, Role};
