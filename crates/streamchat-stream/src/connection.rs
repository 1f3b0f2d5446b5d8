//! Connection manager.
//!
//! Owns the single duplex connection of the client. Each connection is bound to one
//! `(token, conversation)` pair at creation and gets a fresh [`ConnectionId`];
//! creating a new one supersedes the previous, whose late events are then ignored.
//!
//! ```text
//!   connect()        dial ok          peer close / error / close()
//!  ───────────▶ Connecting ───────▶ Open ─────────────────────────▶ Closed
//!                   │                                                  ▲
//!                   └───────────────── dial error ─────────────────────┘
//! ```
//!
//! I/O runs in a spawned task per connection which only posts [`ConnectionEvent`]s
//! back to the owner; it never touches shared state.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};

use streamchat_core::{AccessToken, ConversationId};

use crate::error::ConnectionError;
use crate::StreamEvent;

// ============================================================================
// Types
// ============================================================================

/// Identifier of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection status. Transitions are monotonic per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Dialing.
    Connecting,
    /// Ready to send and receive.
    Open,
    /// Closed, failed, or never opened.
    Closed,
}

impl ConnectionStatus {
    /// Returns `true` if frames can be sent.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Event posted by a connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection is open.
    Opened {
        /// Connection the event belongs to.
        id: ConnectionId,
    },
    /// A text frame arrived.
    Frame {
        /// Connection the event belongs to.
        id: ConnectionId,
        /// Frame payload.
        text: String,
    },
    /// The connection closed or could not be opened.
    Closed {
        /// Connection the event belongs to.
        id: ConnectionId,
    },
}

impl ConnectionEvent {
    /// Connection the event belongs to.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        match self {
            Self::Opened { id } | Self::Frame { id, .. } | Self::Closed { id } => *id,
        }
    }
}

/// What a connection is bound to.
#[derive(Debug, Clone)]
pub struct DialTarget {
    /// Conversation the server should stream for.
    pub conversation: ConversationId,
    /// Credential presented to the server.
    pub token: AccessToken,
}

/// Outbound half of a dialed connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ConnectionError> + Send>>;

/// Inbound half of a dialed connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ConnectionError>> + Send>>;

/// Opens the duplex transport for a target.
///
/// The WebSocket implementation lives in [`crate::ws`]; tests substitute an
/// in-memory one.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Open a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn dial(&self, target: &DialTarget) -> Result<(FrameSink, FrameStream), ConnectionError>;
}

// ============================================================================
// Manager
// ============================================================================

#[derive(Debug)]
struct Current {
    id: ConnectionId,
    conversation: ConversationId,
    status: ConnectionStatus,
    outbound: Option<mpsc::Sender<String>>,
}

/// Owner of the current connection.
pub struct ConnectionManager<D> {
    dialer: Arc<D>,
    next_id: u64,
    outbound_buffer: usize,
    current: Option<Current>,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Create a manager that posts connection events on `events`.
    pub fn new(
        dialer: D,
        outbound_buffer: usize,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Closed);
        Self {
            dialer: Arc::new(dialer),
            next_id: 0,
            outbound_buffer: outbound_buffer.max(1),
            current: None,
            status,
            events,
        }
    }

    /// Open a connection for `conversation`, superseding the current one.
    pub fn connect(&mut self, conversation: ConversationId, token: AccessToken) -> ConnectionId {
        self.close();

        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_buffer);

        tracing::info!(connection_id = %id, conversation_id = %conversation, "Connecting");

        let target = DialTarget {
            conversation: conversation.clone(),
            token,
        };
        tokio::spawn(run_connection(
            Arc::clone(&self.dialer),
            target,
            id,
            outbound_rx,
            self.events.clone(),
        ));

        self.current = Some(Current {
            id,
            conversation,
            status: ConnectionStatus::Connecting,
            outbound: Some(outbound_tx),
        });
        self.publish(ConnectionStatus::Connecting);
        id
    }

    /// Close the current connection. Idempotent.
    pub fn close(&mut self) {
        if let Some(current) = self.current.as_mut() {
            if current.outbound.take().is_some() {
                tracing::debug!(connection_id = %current.id, "Closing connection");
            }
            current.status = ConnectionStatus::Closed;
        }
        self.publish(ConnectionStatus::Closed);
    }

    /// Apply an event from a connection task.
    ///
    /// Returns `false` if the event belongs to a superseded connection, in which
    /// case it must be ignored.
    pub fn apply(&mut self, event: &ConnectionEvent) -> bool {
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        if current.id != event.id() {
            return false;
        }
        // A closed handle stays closed even if its task reports late.
        if current.status == ConnectionStatus::Closed {
            return matches!(event, ConnectionEvent::Closed { .. });
        }

        let status = match event {
            ConnectionEvent::Opened { .. } => ConnectionStatus::Open,
            ConnectionEvent::Closed { .. } => {
                current.outbound = None;
                ConnectionStatus::Closed
            }
            ConnectionEvent::Frame { .. } => return true,
        };
        current.status = status;
        tracing::debug!(connection_id = %current.id, ?status, "Connection status changed");
        self.publish(status);
        true
    }

    /// Transmit `text` on the current connection.
    ///
    /// Returns `false` without sending unless the current connection is open.
    pub fn send(&self, text: String) -> bool {
        let Some(current) = self.current.as_ref() else {
            return false;
        };
        if current.status != ConnectionStatus::Open {
            return false;
        }
        let Some(outbound) = current.outbound.as_ref() else {
            return false;
        };
        match outbound.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(connection_id = %current.id, error = %e, "Outbound queue rejected frame");
                false
            }
        }
    }

    /// Status of the current connection.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.current
            .as_ref()
            .map_or(ConnectionStatus::Closed, |c| c.status)
    }

    /// Returns `true` if the current connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status().is_open()
    }

    /// Id of the current connection.
    #[must_use]
    pub fn current_id(&self) -> Option<ConnectionId> {
        self.current.as_ref().map(|c| c.id)
    }

    /// Conversation the current connection is bound to.
    #[must_use]
    pub fn current_conversation(&self) -> Option<&ConversationId> {
        self.current.as_ref().map(|c| &c.conversation)
    }

    /// Observe status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn publish(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

impl<D> fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("next_id", &self.next_id)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection task
// ============================================================================

/// Drive one connection until either side closes.
async fn run_connection<D: Dialer>(
    dialer: Arc<D>,
    target: DialTarget,
    id: ConnectionId,
    mut outbound: mpsc::Receiver<String>,
    events: mpsc::UnboundedSender<StreamEvent>,
) {
    let emit = |event: ConnectionEvent| {
        // The owner may already be gone during shutdown.
        let _ = events.send(StreamEvent::Connection(event));
    };

    let (mut sink, mut stream) = match dialer.dial(&target).await {
        Ok(halves) => halves,
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "Connection failed");
            emit(ConnectionEvent::Closed { id });
            return;
        }
    };

    emit(ConnectionEvent::Opened { id });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(text)) => emit(ConnectionEvent::Frame { id, text }),
                Some(Err(e)) => {
                    tracing::warn!(connection_id = %id, error = %e, "Connection read failed");
                    break;
                }
                None => {
                    tracing::debug!(connection_id = %id, "Connection closed by peer");
                    break;
                }
            },
            message = outbound.recv() => match message {
                Some(text) => {
                    if let Err(e) = sink.send(text).await {
                        tracing::warn!(connection_id = %id, error = %e, "Connection write failed");
                        break;
                    }
                }
                None => {
                    // The manager dropped its handle.
                    if let Err(e) = sink.close().await {
                        tracing::debug!(connection_id = %id, error = %e, "Close handshake failed");
                    }
                    break;
                }
            },
        }
    }

    emit(ConnectionEvent::Closed { id });
}
