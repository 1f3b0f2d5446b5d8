//! Stream lifecycle controller.
//!
//! The controller is the only place that decides which sink is active. It reacts to
//! every trigger (local send, inbound frame, watchdog tick, conversation switch,
//! connection loss) and never returns an error: every operation reports an outcome
//! instead.
//!
//! All methods are synchronous and meant to be called from a single event loop.
//! Anything that has to wait (dialing, the delayed send retry) runs in a spawned
//! task that posts a [`StreamEvent`] back to that loop.

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use streamchat_core::{AccessToken, ConversationId, Message};

use crate::assembler::{AssemblyStats, ChunkAssembler};
use crate::config::StreamConfig;
use crate::connection::{
    ConnectionEvent, ConnectionId, ConnectionManager, ConnectionStatus, Dialer,
};
use crate::sink::{OutputSink, SinkId};
use crate::state::{ContextEpoch, StreamPhase};
use crate::watchdog::Watchdog;

// ============================================================================
// Events and outcomes
// ============================================================================

/// Event delivered to [`StreamController::handle_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Something happened on a connection.
    Connection(ConnectionEvent),
    /// The delayed retry of a send attempted while disconnected.
    RetrySend {
        /// Context the send was attempted in.
        epoch: ContextEpoch,
        /// Message text.
        text: String,
    },
}

/// Result of [`StreamController::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was transmitted; the answer streams into `sink`.
    Sent {
        /// Placeholder created for the answer.
        sink: SinkId,
    },
    /// Not connected: a reconnect was started and one retry scheduled.
    Reconnecting,
    /// Nothing to send.
    Empty,
    /// No conversation is selected.
    NoConversation,
    /// The message could not be transmitted and was discarded.
    Dropped,
}

/// How the sink for an inbound chunk was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOrigin {
    /// The tracked sink of the active stream.
    Tracked,
    /// An unsettled sink left behind by an earlier state.
    Reclaimed,
    /// A fresh sink created for an unexpected stream.
    Created,
}

/// Result of [`StreamController::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event belonged to a superseded connection or context and was ignored.
    Stale,
    /// The current connection changed status.
    StatusChanged(ConnectionStatus),
    /// A chunk was appended.
    Appended {
        /// Sink that received the chunk.
        sink: SinkId,
        /// How the sink was resolved.
        origin: SinkOrigin,
    },
    /// A delayed send was retried.
    Retry(SendOutcome),
}

impl EventOutcome {
    /// Returns `true` if the presentation changed and should be redrawn.
    #[must_use]
    pub const fn needs_redraw(&self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// Emitted when the watchdog infers that a stream finished.
///
/// The caller should refresh conversation metadata from the store in response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCompleted {
    /// Sink that was settled.
    pub sink: SinkId,
    /// Conversation the stream belonged to.
    pub conversation: Option<ConversationId>,
    /// Context the stream completed in.
    pub epoch: ContextEpoch,
    /// Chunk and byte counts of the stream.
    pub stats: AssemblyStats,
}

// ============================================================================
// Controller
// ============================================================================

/// Orchestrates the sink, assembler, watchdog and connection.
#[derive(Debug)]
pub struct StreamController<D> {
    config: StreamConfig,
    phase: StreamPhase,
    assembler: ChunkAssembler,
    watchdog: Watchdog,
    connections: ConnectionManager<D>,
    conversation: Option<ConversationId>,
    credential: Option<AccessToken>,
    epoch: ContextEpoch,
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl<D: Dialer> StreamController<D> {
    /// Create a controller and the receiver its events arrive on.
    pub fn new(config: StreamConfig, dialer: D) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            watchdog: Watchdog::new(config.poll_interval(), config.idle_threshold()),
            connections: ConnectionManager::new(dialer, config.outbound_buffer, events.clone()),
            config,
            phase: StreamPhase::Idle,
            assembler: ChunkAssembler::new(),
            conversation: None,
            credential: None,
            epoch: ContextEpoch::default(),
            events,
        };
        (controller, events_rx)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current stream phase.
    #[must_use]
    pub const fn phase(&self) -> &StreamPhase {
        &self.phase
    }

    /// Returns `true` while a stream is tracked.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.phase.is_active()
    }

    /// Sink of the active stream.
    #[must_use]
    pub const fn active_sink(&self) -> Option<SinkId> {
        self.phase.sink()
    }

    /// Current conversation.
    #[must_use]
    pub const fn conversation(&self) -> Option<&ConversationId> {
        self.conversation.as_ref()
    }

    /// Current context epoch.
    #[must_use]
    pub const fn epoch(&self) -> ContextEpoch {
        self.epoch
    }

    /// Returns `true` if `epoch` is still the current context.
    #[must_use]
    pub fn is_current(&self, epoch: ContextEpoch) -> bool {
        self.epoch == epoch
    }

    /// Returns `true` once a credential has been provided.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Status of the current connection.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connections.status()
    }

    /// Id of the current connection.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connections.current_id()
    }

    /// Observe connection status transitions.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connections.subscribe()
    }

    /// Returns `true` while the watchdog is armed.
    #[must_use]
    pub const fn watchdog_armed(&self) -> bool {
        self.watchdog.is_armed()
    }

    // =========================================================================
    // Context lifecycle
    // =========================================================================

    /// Store the credential used for new connections.
    pub fn authenticate(&mut self, token: AccessToken) {
        self.credential = Some(token);
    }

    /// Make `conversation` current.
    ///
    /// Settles any in-flight stream, closes the connection and starts a new epoch
    /// before returning, so nothing from the previous context can land afterwards.
    /// Call [`connect`](Self::connect) once the new conversation is ready.
    pub fn switch_conversation<S>(
        &mut self,
        out: &mut S,
        conversation: Option<ConversationId>,
    ) -> ContextEpoch
    where
        S: OutputSink + ?Sized,
    {
        self.reset(out, "context switch");
        self.connections.close();
        self.epoch = self.epoch.next();
        tracing::info!(
            epoch = %self.epoch,
            conversation_id = conversation.as_ref().map(ConversationId::as_str),
            "Switched conversation"
        );
        self.conversation = conversation;
        self.epoch
    }

    /// Drop the credential and the current conversation.
    pub fn logout<S>(&mut self, out: &mut S) -> ContextEpoch
    where
        S: OutputSink + ?Sized,
    {
        let epoch = self.switch_conversation(out, None);
        self.credential = None;
        epoch
    }

    /// Open a connection for the current conversation.
    ///
    /// Returns `None` without connecting when there is no credential or no
    /// conversation. An existing connection is superseded.
    pub fn connect(&mut self) -> Option<ConnectionId> {
        let (Some(conversation), Some(token)) = (self.conversation.clone(), self.credential.clone())
        else {
            tracing::debug!("Not connecting: no conversation or credential");
            return None;
        };
        Some(self.connections.connect(conversation, token))
    }

    /// Open a connection for the current conversation unless one bound to it is
    /// already connecting or open, in which case its id is returned.
    pub fn ensure_connected(&mut self) -> Option<ConnectionId> {
        let live = self.connections.status() != ConnectionStatus::Closed
            && self.connections.current_conversation() == self.conversation.as_ref();
        if live {
            return self.connections.current_id();
        }
        self.connect()
    }

    /// Reconnect the current conversation on demand.
    ///
    /// The active stream, if any, is detached without being settled. Its sink stays
    /// open, so the first chunk on the new connection reclaims it.
    pub fn reconnect(&mut self) -> Option<ConnectionId> {
        if let Some(sink) = self.phase.take() {
            let stats = self.assembler.reset();
            self.watchdog.disarm();
            tracing::debug!(%sink, chunks = stats.chunks, "Detached stream for reconnect");
        }
        self.connect()
    }

    /// Close the connection without changing the context.
    pub fn disconnect(&mut self) {
        self.connections.close();
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send a user message.
    ///
    /// When the connection is open the previous stream is force-settled, the user
    /// message rendered, a fresh placeholder created and the watchdog armed before
    /// transmitting. Otherwise a reconnect is started and exactly one retry is
    /// scheduled after the configured delay.
    pub fn send<S>(&mut self, out: &mut S, text: &str, now: Instant) -> SendOutcome
    where
        S: OutputSink + ?Sized,
    {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }
        if self.conversation.is_none() {
            return SendOutcome::NoConversation;
        }

        if !self.connections.is_open() {
            tracing::info!(epoch = %self.epoch, "Send while disconnected, reconnecting");
            self.connect();
            self.schedule_retry(text.to_string());
            return SendOutcome::Reconnecting;
        }

        self.transmit(out, text, now)
    }

    fn transmit<S>(&mut self, out: &mut S, text: &str, now: Instant) -> SendOutcome
    where
        S: OutputSink + ?Sized,
    {
        self.reset(out, "superseded by send");

        out.push_message(Message::user(text));
        let sink = out.create_empty();
        self.begin(sink, now);

        if self.connections.send(text.to_string()) {
            tracing::debug!(%sink, len = text.len(), "Message sent");
            SendOutcome::Sent { sink }
        } else {
            // The placeholder stays until the watchdog settles it.
            tracing::warn!(%sink, "Message could not be queued");
            SendOutcome::Dropped
        }
    }

    fn schedule_retry(&self, text: String) {
        let events = self.events.clone();
        let epoch = self.epoch;
        let delay = self.config.send_retry_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(StreamEvent::RetrySend { epoch, text });
        });
    }

    // =========================================================================
    // Inbound events
    // =========================================================================

    /// Process one event from the controller's receiver.
    pub fn handle_event<S>(&mut self, out: &mut S, event: StreamEvent, now: Instant) -> EventOutcome
    where
        S: OutputSink + ?Sized,
    {
        match event {
            StreamEvent::Connection(event) => {
                if !self.connections.apply(&event) {
                    tracing::trace!(connection_id = %event.id(), "Ignoring stale connection event");
                    return EventOutcome::Stale;
                }
                match event {
                    ConnectionEvent::Frame { text, .. } => self.on_frame(out, &text, now),
                    ConnectionEvent::Opened { .. } | ConnectionEvent::Closed { .. } => {
                        EventOutcome::StatusChanged(self.connections.status())
                    }
                }
            }
            StreamEvent::RetrySend { epoch, text } => {
                if !self.is_current(epoch) {
                    tracing::debug!(%epoch, current = %self.epoch, "Dropping retry from previous context");
                    return EventOutcome::Stale;
                }
                if !self.connections.is_open() {
                    tracing::warn!(len = text.len(), "Retry found no open connection, message dropped");
                    return EventOutcome::Retry(SendOutcome::Dropped);
                }
                EventOutcome::Retry(self.transmit(out, &text, now))
            }
        }
    }

    fn on_frame<S>(&mut self, out: &mut S, text: &str, now: Instant) -> EventOutcome
    where
        S: OutputSink + ?Sized,
    {
        let (sink, origin) = if let Some(sink) = self.phase.sink() {
            (sink, SinkOrigin::Tracked)
        } else if let Some(sink) = out.pending_tail() {
            (sink, SinkOrigin::Reclaimed)
        } else {
            (out.create_empty(), SinkOrigin::Created)
        };

        if origin != SinkOrigin::Tracked {
            tracing::info!(%sink, ?origin, "Chunk without active stream, adopting sink");
            self.begin(sink, now);
        }

        self.assembler.on_chunk(out, sink, text);
        self.phase.touch(now);

        EventOutcome::Appended { sink, origin }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Wait for the next watchdog tick. Never resolves while the watchdog is
    /// disarmed, so it can sit in a `select!` unconditionally.
    pub async fn watchdog_tick(&mut self) -> Instant {
        self.watchdog.tick().await
    }

    /// Check the watchdog at `now` and settle the stream if it went quiet.
    pub fn poll_watchdog<S>(&mut self, out: &mut S, now: Instant) -> Option<StreamCompleted>
    where
        S: OutputSink + ?Sized,
    {
        if !self.watchdog.poll(now, &self.phase) {
            return None;
        }
        let sink = self.phase.take()?;
        out.settle(sink);
        let stats = self.assembler.reset();

        tracing::info!(
            %sink,
            epoch = %self.epoch,
            chunks = stats.chunks,
            bytes = stats.bytes,
            "Stream complete"
        );

        Some(StreamCompleted {
            sink,
            conversation: self.conversation.clone(),
            epoch: self.epoch,
            stats,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin(&mut self, sink: SinkId, now: Instant) {
        self.phase = StreamPhase::Streaming {
            sink,
            last_activity_at: now,
        };
        self.assembler.reset();
        self.watchdog.arm(now);
    }

    fn reset<S>(&mut self, out: &mut S, reason: &'static str)
    where
        S: OutputSink + ?Sized,
    {
        if let Some(sink) = self.phase.take() {
            out.settle(sink);
            let stats = self.assembler.reset();
            tracing::debug!(%sink, reason, chunks = stats.chunks, "Settled stream");
        }
        self.watchdog.disarm();
    }
}
