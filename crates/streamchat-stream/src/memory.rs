//! In-process dialer.
//!
//! Every accepted dial queues a [`PeerHandle`] that plays the server side of the
//! connection. Used by the test suites of this workspace and for driving a
//! controller without a network.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;

use crate::connection::{DialTarget, Dialer, FrameSink, FrameStream};
use crate::error::ConnectionError;

/// Server end of one in-memory connection.
#[derive(Debug)]
pub struct PeerHandle {
    /// What the client dialed.
    pub target: DialTarget,
    to_client: Option<UnboundedSender<Result<String, ConnectionError>>>,
    from_client: UnboundedReceiver<String>,
}

impl PeerHandle {
    /// Push one text fragment to the client. Returns `false` once hung up.
    pub fn push(&self, text: &str) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(Ok(text.to_string())).is_ok())
    }

    /// Fail the connection with a transport error.
    pub fn fail(&mut self, reason: &str) {
        if let Some(tx) = self.to_client.take() {
            let _ = tx.unbounded_send(Err(ConnectionError::Transport(reason.to_string())));
        }
    }

    /// Close the connection from the server side.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    /// Next frame the client sent, or `None` once the client closed.
    pub async fn received(&mut self) -> Option<String> {
        self.from_client.next().await
    }
}

#[derive(Debug, Default)]
struct State {
    refuse: bool,
    accepted: VecDeque<PeerHandle>,
    dials: usize,
}

/// Dialer backed by in-process channels.
#[derive(Debug, Clone, Default)]
pub struct MemoryDialer {
    state: Arc<Mutex<State>>,
}

impl MemoryDialer {
    /// Create a dialer that accepts every connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent dials fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Take the oldest accepted connection not yet taken.
    #[must_use]
    pub fn take_peer(&self) -> Option<PeerHandle> {
        self.state.lock().accepted.pop_front()
    }

    /// Number of dial attempts so far, refused ones included.
    #[must_use]
    pub fn dials(&self) -> usize {
        self.state.lock().dials
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, target: &DialTarget) -> Result<(FrameSink, FrameStream), ConnectionError> {
        let mut state = self.state.lock();
        state.dials += 1;
        if state.refuse {
            return Err(ConnectionError::Transport("connection refused".to_string()));
        }

        let (client_tx, server_rx) = unbounded::<String>();
        let (server_tx, client_rx) = unbounded::<Result<String, ConnectionError>>();

        state.accepted.push_back(PeerHandle {
            target: target.clone(),
            to_client: Some(server_tx),
            from_client: server_rx,
        });

        let sink: FrameSink =
            Box::pin(client_tx.sink_map_err(|e| ConnectionError::Transport(e.to_string())));
        let stream: FrameStream = Box::pin(client_rx);
        Ok((sink, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamchat_core::{AccessToken, ConversationId};

    fn target() -> DialTarget {
        DialTarget {
            conversation: ConversationId::from(3),
            token: AccessToken::new("t"),
        }
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let dialer = MemoryDialer::new();
        let (mut sink, mut stream) = dialer.dial(&target()).await.unwrap();
        let mut peer = dialer.take_peer().unwrap();

        sink.send("ping".to_string()).await.unwrap();
        assert_eq!(peer.received().await.as_deref(), Some("ping"));

        assert!(peer.push("pong"));
        assert_eq!(stream.next().await.unwrap().unwrap(), "pong");

        peer.hang_up();
        assert!(!peer.push("late"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn refused_dial_still_counts() {
        let dialer = MemoryDialer::new();
        dialer.refuse_connections(true);

        assert!(dialer.dial(&target()).await.is_err());
        assert_eq!(dialer.dials(), 1);
        assert!(dialer.take_peer().is_none());
    }

    #[tokio::test]
    async fn failure_surfaces_as_transport_error() {
        let dialer = MemoryDialer::new();
        let (_sink, mut stream) = dialer.dial(&target()).await.unwrap();
        let mut peer = dialer.take_peer().unwrap();

        peer.fail("reset");
        assert!(matches!(
            stream.next().await,
            Some(Err(ConnectionError::Transport(_)))
        ));
    }
}
