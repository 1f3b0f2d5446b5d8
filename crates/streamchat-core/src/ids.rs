//! Identifier types for streamchat.
//!
//! Conversation ids are assigned by the server. The reference server emits them as
//! JSON integers, but the client never does arithmetic on them, so they are kept as
//! opaque text and accepted in either representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A server-assigned conversation identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawId", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a `ConversationId` from any non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Empty`] if the trimmed input is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        if trimmed.len() == value.len() {
            Ok(Self(value))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Return the id as it is sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({})", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConversationId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u64> for ConversationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<ConversationId> for String {
    fn from(id: ConversationId) -> Self {
        id.0
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Wire representation accepted when deserializing a [`ConversationId`].
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl TryFrom<RawId> for ConversationId {
    type Error = IdError;

    fn try_from(raw: RawId) -> Result<Self, Self::Error> {
        match raw {
            RawId::Number(n) => Ok(Self(n.to_string())),
            RawId::Text(s) => Self::new(s),
        }
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty or only whitespace.
    #[error("identifier must not be empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_ids() {
        let id: ConversationId = serde_json::from_str("17").unwrap();
        assert_eq!(id.as_str(), "17");
        assert_eq!(id, ConversationId::from(17));
    }

    #[test]
    fn parses_string_ids() {
        let id: ConversationId = serde_json::from_str("\"conv-a\"").unwrap();
        assert_eq!(id.to_string(), "conv-a");
    }

    #[test]
    fn rejects_empty_ids() {
        assert_eq!(ConversationId::from_str("  "), Err(IdError::Empty));
        assert!(serde_json::from_str::<ConversationId>("\"\"").is_err());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = ConversationId::new(" 9 ").unwrap();
        assert_eq!(id.as_str(), "9");
    }

    #[test]
    fn serializes_as_string() {
        let id = ConversationId::from(5);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"5\"");
    }

    #[test]
    fn debug_includes_value() {
        let id = ConversationId::from(3);
        assert_eq!(format!("{id:?}"), "ConversationId(3)");
    }
}
