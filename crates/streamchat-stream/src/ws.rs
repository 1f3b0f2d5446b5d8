//! WebSocket dialer for the chat endpoint.
//!
//! Endpoint: `WS {base}/ws/chat?token=<token>&conversation_id=<id>`
//!
//! The server pushes raw UTF-8 text fragments with no framing of its own and
//! rejects bad credentials by closing with a policy-violation code.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::connection::{DialTarget, Dialer, FrameSink, FrameStream};
use crate::error::ConnectionError;

/// Dials the chat WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsDialer {
    base: Url,
}

impl WsDialer {
    /// Create a dialer for a `ws://` or `wss://` base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidEndpoint`] if the URL does not parse or
    /// uses another scheme.
    pub fn new(base: &str) -> Result<Self, ConnectionError> {
        let base = Url::parse(base).map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))?;
        match base.scheme() {
            "ws" | "wss" => Ok(Self { base }),
            other => Err(ConnectionError::InvalidEndpoint(format!(
                "unsupported scheme '{other}'"
            ))),
        }
    }

    /// Base URL.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Build the chat URL for a target.
    #[must_use]
    pub fn chat_url(&self, target: &DialTarget) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["ws", "chat"]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("token", target.token.expose())
            .append_pair("conversation_id", target.conversation.as_str());
        url
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, target: &DialTarget) -> Result<(FrameSink, FrameStream), ConnectionError> {
        let url = self.chat_url(target);
        tracing::debug!(
            host = url.host_str().unwrap_or_default(),
            conversation_id = %target.conversation,
            "Dialing chat socket"
        );

        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(|e| ConnectionError::Transport(e.to_string()))
            .with(|text: String| futures::future::ok::<_, ConnectionError>(Message::Text(text)));

        let stream = read.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        tracing::info!(code = %frame.code, reason = %frame.reason, "Server closed chat socket");
                    }
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        });

        let sink: FrameSink = Box::pin(sink);
        let stream: FrameStream = Box::pin(stream);
        Ok((sink, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamchat_core::{AccessToken, ConversationId};

    fn target() -> DialTarget {
        DialTarget {
            conversation: ConversationId::from(12),
            token: AccessToken::new("a b&c"),
        }
    }

    #[test]
    fn builds_chat_url() {
        let dialer = WsDialer::new("ws://127.0.0.1:8000").unwrap();
        let url = dialer.chat_url(&target());
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:8000/ws/chat?token=a+b%26c&conversation_id=12"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        let dialer = WsDialer::new("wss://chat.example.com/api/").unwrap();
        let url = dialer.chat_url(&target());
        assert_eq!(url.path(), "/api/ws/chat");
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn rejects_http_scheme() {
        let err = WsDialer::new("http://127.0.0.1:8000").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidEndpoint(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(WsDialer::new("not a url").is_err());
    }

    #[tokio::test]
    async fn dial_refused_is_transport_error() {
        // Port 9 (discard) is essentially never listening for WebSocket upgrades.
        let dialer = WsDialer::new("ws://127.0.0.1:9").unwrap();
        let result = dialer.dial(&target()).await;
        assert!(matches!(result, Err(ConnectionError::Transport(_))));
    }
}
