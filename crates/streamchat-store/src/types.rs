//! Request and response payloads of the store API.

use serde::{Deserialize, Serialize};

/// Request body for creating a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationRequest {
    /// Conversation title. The server substitutes a default when empty.
    pub title: String,
}

/// Result of a document upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Server status string, `"ok"` on success.
    #[serde(default)]
    pub status: String,
    /// Name the server stored the file under.
    #[serde(default)]
    pub file: String,
    /// Number of chunks indexed.
    #[serde(default)]
    pub chunks: u64,
}

impl IngestReport {
    /// Returns `true` if the server reported success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_report_parses() {
        let report: IngestReport =
            serde_json::from_str(r#"{"status":"ok","file":"a.pdf","chunks":12}"#).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.chunks, 12);
    }

    #[test]
    fn create_request_serializes_title() {
        let json = serde_json::to_string(&CreateConversationRequest {
            title: "Notes".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"title":"Notes"}"#);
    }
}
