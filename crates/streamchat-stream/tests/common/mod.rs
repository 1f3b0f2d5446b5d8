//! Controller harness over the in-memory dialer.

#![allow(dead_code)]

use tokio::time::Instant;

use streamchat_core::{AccessToken, ConversationId};
use streamchat_stream::{
    ConnectionStatus, EventOutcome, MemoryDialer, PeerHandle, StreamCompleted, StreamConfig,
    StreamController, StreamEvent, Transcript,
};

/// Controller, its event receiver and a transcript, wired together.
pub struct Harness {
    pub controller: StreamController<MemoryDialer>,
    pub events: tokio::sync::mpsc::UnboundedReceiver<StreamEvent>,
    pub transcript: Transcript,
    pub dialer: MemoryDialer,
}

impl Harness {
    pub fn new() -> Self {
        let dialer = MemoryDialer::default();
        let (mut controller, events) =
            StreamController::new(StreamConfig::default(), dialer.clone());
        controller.authenticate(AccessToken::new("test-token"));
        Self {
            controller,
            events,
            transcript: Transcript::new(),
            dialer,
        }
    }

    /// Switch to `conversation` without connecting.
    pub fn select(&mut self, conversation: u64) {
        self.controller
            .switch_conversation(&mut self.transcript, Some(ConversationId::from(conversation)));
    }

    /// Switch to `conversation`, connect and wait until the connection is open.
    pub async fn open(&mut self, conversation: u64) -> PeerHandle {
        self.select(conversation);
        self.controller.connect().expect("connect");
        self.wait_for_status(ConnectionStatus::Open).await;
        self.take_peer()
    }

    /// Server side of the oldest accepted connection.
    pub fn take_peer(&self) -> PeerHandle {
        self.dialer.take_peer().expect("no accepted connection")
    }

    /// Process the next controller event.
    pub async fn pump(&mut self) -> EventOutcome {
        let event = self.events.recv().await.expect("event channel closed");
        self.controller
            .handle_event(&mut self.transcript, event, Instant::now())
    }

    /// Pump until a status change to `status`, returning every outcome seen before it.
    pub async fn wait_for_status(&mut self, status: ConnectionStatus) -> Vec<EventOutcome> {
        let mut seen = Vec::new();
        loop {
            let outcome = self.pump().await;
            if outcome == EventOutcome::StatusChanged(status) {
                return seen;
            }
            seen.push(outcome);
        }
    }

    /// Run the watchdog until it fires, returning the firing time.
    pub async fn run_watchdog(&mut self) -> (Instant, StreamCompleted) {
        loop {
            let now = self.controller.watchdog_tick().await;
            if let Some(done) = self.controller.poll_watchdog(&mut self.transcript, now) {
                return (now, done);
            }
        }
    }

    /// Number of entries that can still receive text.
    pub fn open_entries(&self) -> usize {
        self.transcript
            .entries()
            .iter()
            .filter(|e| e.is_open())
            .count()
    }
}
