//! In-memory store for tests.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use streamchat_core::{Conversation, ConversationId, Message};

use crate::error::{Result, StoreError};
use crate::types::IngestReport;
use crate::ConversationStore;

#[derive(Debug, Default)]
struct Inner {
    // Newest first, matching the REST API.
    conversations: Vec<(Conversation, Vec<Message>)>,
    next_id: u64,
    list_calls: usize,
    failing: bool,
    uploads: Vec<String>,
}

/// A [`ConversationStore`] backed by a mutex-guarded vector.
///
/// It also records how often conversations were listed and can be switched into a
/// failing mode, which lets tests observe refreshes and error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a conversation with the given history and return its id.
    pub fn seed(&self, title: &str, history: Vec<Message>) -> ConversationId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = ConversationId::from(inner.next_id);
        let conversation = Conversation {
            id: id.clone(),
            title: title.to_string(),
        };
        inner.conversations.insert(0, (conversation, history));
        id
    }

    /// Number of `list_conversations` calls so far.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.inner.lock().list_calls
    }

    /// Make every following call fail with an API error.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// File names uploaded so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        self.inner.lock().uploads.clone()
    }

    fn check(inner: &Inner) -> Result<()> {
        if inner.failing {
            Err(StoreError::Api {
                status: 500,
                message: "store unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut inner = self.inner.lock();
        inner.list_calls += 1;
        Self::check(&inner)?;
        Ok(inner.conversations.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation> {
        Self::check(&self.inner.lock())?;
        let id = self.seed(title, Vec::new());
        Ok(Conversation {
            id,
            title: title.to_string(),
        })
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        let before = inner.conversations.len();
        inner.conversations.retain(|(c, _)| c.id != *id);
        if inner.conversations.len() == before {
            return Err(StoreError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    async fn list_messages(&self, id: &ConversationId, limit: usize) -> Result<Vec<Message>> {
        let inner = self.inner.lock();
        Self::check(&inner)?;
        inner
            .conversations
            .iter()
            .find(|(c, _)| c.id == *id)
            .map(|(_, history)| history.iter().take(limit).cloned().collect())
            .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))
    }

    async fn ingest_document(&self, path: &Path) -> Result<IngestReport> {
        let bytes = tokio::fs::read(path).await?;
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        inner.uploads.push(file.clone());

        Ok(IngestReport {
            status: "ok".to_string(),
            file,
            chunks: (bytes.len() as u64).div_ceil(1000),
        })
    }
}
