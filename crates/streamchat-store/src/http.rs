//! REST implementation of [`ConversationStore`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use streamchat_core::{AccessToken, Conversation, ConversationId, ErrorBody, Message};

use crate::error::{Result, StoreError};
use crate::types::{CreateConversationRequest, IngestReport};
use crate::ConversationStore;

/// Client for the conversation REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    base: Url,
    auth: HeaderValue,
}

impl HttpStore {
    /// Create a new store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the API (e.g., "http://127.0.0.1:8000")
    /// * `token` - Bearer token from the credential provider
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse, if the token contains bytes
    /// that are not valid in a header, or if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: AccessToken) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
            .map_err(|_| StoreError::InvalidToken)?;
        auth.set_sensitive(true);

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url,
            base,
            auth,
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of one conversation, with `rest` appended. The id is percent-encoded as a
    /// single path segment.
    fn conversation_url(&self, id: &ConversationId, rest: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("conversations")
                .push(id.as_str())
                .extend(rest);
        }
        url
    }

    /// Build headers for authenticated requests.
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers
    }

    /// Handle API error responses.
    async fn handle_error(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .message()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::UNAUTHORIZED => StoreError::Unauthorized(message),
            _ => StoreError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Check the status and decode a JSON body.
    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ConversationStore for HttpStore {
    // =========================================================================
    // Conversation Operations
    // =========================================================================

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let url = format!("{}/conversations", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        let conversations: Vec<Conversation> = Self::parse(response).await?;
        tracing::debug!(count = conversations.len(), "Listed conversations");
        Ok(conversations)
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation> {
        let url = format!("{}/conversations", self.base_url);

        let request = CreateConversationRequest {
            title: title.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .json(&request)
            .send()
            .await?;

        let conversation: Conversation = Self::parse(response).await?;
        tracing::debug!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        let url = self.conversation_url(id, &[]);

        let response = self
            .client
            .delete(url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if response.status() != StatusCode::NO_CONTENT && !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        tracing::debug!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    // =========================================================================
    // Message Operations
    // =========================================================================

    async fn list_messages(&self, id: &ConversationId, limit: usize) -> Result<Vec<Message>> {
        let url = self.conversation_url(id, &["messages"]);

        let response = self
            .client
            .get(url)
            .headers(self.auth_headers())
            .query(&[("limit", limit)])
            .send()
            .await?;

        Self::parse(response).await
    }

    // =========================================================================
    // Document Operations
    // =========================================================================

    async fn ingest_document(&self, path: &Path) -> Result<IngestReport> {
        let url = format!("{}/ingest-pdf", self.base_url);

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "document.pdf".to_string(), |n| n.to_string_lossy().into_owned());

        tracing::debug!(file = %file_name, size = bytes.len(), "Uploading document");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .multipart(form)
            .send()
            .await?;

        Self::parse(response).await
    }
}
