//! Output sink abstraction.
//!
//! A sink is one place assistant text can be appended to, typically a chat bubble.
//! The controller only ever talks to the presentation through [`OutputSink`].

use std::fmt;

use streamchat_core::Message;

/// Opaque reference to one append target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl SinkId {
    /// Wrap a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// Presentation surface used by the stream controller.
///
/// None of the operations fail. Calls with an unknown or already settled sink are
/// tolerated; `append` on a settled sink is never issued by the controller.
pub trait OutputSink {
    /// Allocate a new, empty assistant target in the pending state.
    fn create_empty(&mut self) -> SinkId;

    /// Append `text` verbatim and clear the pending state.
    fn append(&mut self, sink: SinkId, text: &str);

    /// Mark the target complete. Idempotent.
    fn settle(&mut self, sink: SinkId);

    /// Return the most recent assistant target if it is still unsettled and nothing
    /// has been rendered after it.
    fn pending_tail(&self) -> Option<SinkId>;

    /// Render an already complete message.
    fn push_message(&mut self, message: Message);
}
