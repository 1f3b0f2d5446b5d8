//! Streaming message reconstruction for streamchat.
//!
//! The chat server answers over one WebSocket per conversation by pushing raw text
//! fragments. There is no "done" frame, no sequence number and no message id, so
//! this crate rebuilds whole assistant messages from the fragments and infers their
//! end from silence.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────┐
//!   user send ──────▶│  StreamController    │◀────── StreamEvent (mpsc)
//!   switch/logout ──▶│  (owns StreamPhase)  │               ▲
//!   watchdog tick ──▶│                      │               │
//!                    └──┬────────┬────────┬─┘               │
//!                       │        │        │                 │
//!            ┌──────────▼─┐ ┌────▼─────┐ ┌▼──────────────────┴──┐
//!            │ Chunk      │ │ Watchdog │ │ ConnectionManager    │
//!            │ Assembler  │ │ (500 ms) │ │ (one task / socket)  │
//!            └─────┬──────┘ └──────────┘ └──────────┬───────────┘
//!                  │                                │ Dialer
//!            ┌─────▼──────┐                 ┌───────▼──────────┐
//!            │ OutputSink │                 │ WsDialer         │
//!            │ (Transcript│                 │ /ws/chat         │
//!            └────────────┘                 └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use streamchat_core::{AccessToken, ConversationId};
//! use streamchat_stream::{StreamConfig, StreamController, Transcript, WsDialer};
//! use tokio::time::Instant;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dialer = WsDialer::new("ws://127.0.0.1:8000")?;
//! let (mut controller, mut events) = StreamController::new(StreamConfig::default(), dialer);
//! let mut transcript = Transcript::new();
//!
//! controller.authenticate(AccessToken::new("token"));
//! controller.switch_conversation(&mut transcript, Some(ConversationId::from(1)));
//! controller.connect();
//!
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => {
//!             controller.handle_event(&mut transcript, event, Instant::now());
//!         }
//!         now = controller.watchdog_tick() => {
//!             if let Some(done) = controller.poll_watchdog(&mut transcript, now) {
//!                 println!("finished {} ({} chunks)", done.sink, done.stats.chunks);
//!             }
//!         }
//!     }
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod assembler;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod memory;
pub mod sink;
pub mod state;
pub mod transcript;
pub mod watchdog;
pub mod ws;

pub use assembler::{AssemblyStats, ChunkAssembler};
pub use config::StreamConfig;
pub use connection::{
    ConnectionEvent, ConnectionId, ConnectionManager, ConnectionStatus, DialTarget, Dialer,
    FrameSink, FrameStream,
};
pub use controller::{
    EventOutcome, SendOutcome, SinkOrigin, StreamCompleted, StreamController, StreamEvent,
};
pub use error::{ConnectionError, Result};
pub use memory::{MemoryDialer, PeerHandle};
pub use sink::{OutputSink, SinkId};
pub use state::{ContextEpoch, StreamPhase};
pub use transcript::{Entry, EntryKind, EntryState, Transcript};
pub use watchdog::{Watchdog, MIN_POLL_INTERVAL};
pub use ws::WsDialer;
