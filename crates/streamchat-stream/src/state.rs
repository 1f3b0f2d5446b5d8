//! Stream state owned by the controller.
//!
//! ```text
//!            local send / orphan chunk
//!   ┌──────┐ ─────────────────────────▶ ┌───────────┐ ──┐
//!   │ Idle │                            │ Streaming │   │ chunk (touch)
//!   └──────┘ ◀───────────────────────── └───────────┘ ◀─┘
//!            watchdog / reset / detach
//! ```

use std::fmt;

use tokio::time::Instant;

use crate::sink::SinkId;

/// Whether a stream is in progress, and into which sink.
///
/// A sink is tracked exactly when the phase is `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    /// No stream is tracked.
    #[default]
    Idle,
    /// A stream is being assembled into `sink`.
    Streaming {
        /// Sink receiving chunks.
        sink: SinkId,
        /// When the stream was started or last received a chunk.
        last_activity_at: Instant,
    },
}

impl StreamPhase {
    /// Returns `true` while a stream is tracked.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Tracked sink, if any.
    #[must_use]
    pub const fn sink(&self) -> Option<SinkId> {
        match self {
            Self::Idle => None,
            Self::Streaming { sink, .. } => Some(*sink),
        }
    }

    /// Time of the last activity, if streaming.
    #[must_use]
    pub const fn last_activity_at(&self) -> Option<Instant> {
        match self {
            Self::Idle => None,
            Self::Streaming {
                last_activity_at, ..
            } => Some(*last_activity_at),
        }
    }

    /// Record activity. No-op when idle.
    pub fn touch(&mut self, now: Instant) {
        if let Self::Streaming {
            last_activity_at, ..
        } = self
        {
            *last_activity_at = now;
        }
    }

    /// Go idle and return the sink that was tracked.
    pub fn take(&mut self) -> Option<SinkId> {
        std::mem::take(self).sink()
    }
}

/// Generation counter for the conversation context.
///
/// Bumped on every conversation switch, deletion of the active conversation and
/// logout. Work that outlives an await carries the epoch it started in and is
/// discarded if the epoch moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContextEpoch(u64);

impl ContextEpoch {
    /// Return the following epoch.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ContextEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
