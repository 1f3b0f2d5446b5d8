//! In-memory transcript implementing [`OutputSink`].
//!
//! The transcript is the reference presentation model: an ordered list of entries
//! that a renderer can draw. Streaming entries carry a [`SinkId`] and move through
//! `Pending -> Streaming -> Settled`.

use streamchat_core::{Message, Role};

use crate::sink::{OutputSink, SinkId};

/// Rendering state of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Created but no text received yet.
    Pending,
    /// At least one chunk appended, more may follow.
    Streaming,
    /// Complete. Never appended to again.
    Settled,
}

/// What kind of line an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A chat message from the given role.
    Message(Role),
    /// A local status line (greeting, reconnect notice).
    Notice,
}

/// One rendered line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry kind.
    pub kind: EntryKind,
    /// Text rendered so far.
    pub text: String,
    /// Rendering state.
    pub state: EntryState,
    /// Sink reference for streamed entries.
    pub sink: Option<SinkId>,
}

impl Entry {
    fn settled(kind: EntryKind, text: String) -> Self {
        Self {
            kind,
            text,
            state: EntryState::Settled,
            sink: None,
        }
    }

    /// Returns `true` while the entry can still receive text.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, EntryState::Settled)
    }
}

/// Ordered list of chat entries.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_sink: u64,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry. Sink ids are never reused afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Insert settled history ahead of the entries rendered so far.
    ///
    /// Entries added while the history was loading, including an open sink, stay
    /// where they are relative to each other.
    pub fn load(&mut self, history: Vec<Message>) {
        let older = history
            .into_iter()
            .map(|m| Entry::settled(EntryKind::Message(m.role), m.content));
        self.entries.splice(0..0, older);
    }

    /// Append a settled local notice.
    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::settled(EntryKind::Notice, text.into()));
    }

    /// Insert a settled local notice ahead of every entry.
    pub fn prepend_notice(&mut self, text: impl Into<String>) {
        self.entries.insert(0, Entry::settled(EntryKind::Notice, text.into()));
    }

    /// Text of a streamed entry.
    #[must_use]
    pub fn text_of(&self, sink: SinkId) -> Option<&str> {
        self.find(sink).map(|e| e.text.as_str())
    }

    /// State of a streamed entry.
    #[must_use]
    pub fn state_of(&self, sink: SinkId) -> Option<EntryState> {
        self.find(sink).map(|e| e.state)
    }

    /// Returns `true` if any entry is still open.
    #[must_use]
    pub fn has_open_entry(&self) -> bool {
        self.entries.iter().any(Entry::is_open)
    }

    fn find(&self, sink: SinkId) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.sink == Some(sink))
    }

    fn find_mut(&mut self, sink: SinkId) -> Option<&mut Entry> {
        self.entries.iter_mut().rev().find(|e| e.sink == Some(sink))
    }
}

impl OutputSink for Transcript {
    fn create_empty(&mut self) -> SinkId {
        self.next_sink += 1;
        let sink = SinkId::new(self.next_sink);
        self.entries.push(Entry {
            kind: EntryKind::Message(Role::Assistant),
            text: String::new(),
            state: EntryState::Pending,
            sink: Some(sink),
        });
        sink
    }

    fn append(&mut self, sink: SinkId, text: &str) {
        match self.find_mut(sink) {
            Some(entry) if entry.state == EntryState::Settled => {
                tracing::warn!(%sink, "Ignoring append to settled entry");
            }
            Some(entry) => {
                entry.text.push_str(text);
                entry.state = EntryState::Streaming;
            }
            None => {
                tracing::warn!(%sink, "Ignoring append to unknown entry");
            }
        }
    }

    fn settle(&mut self, sink: SinkId) {
        if let Some(entry) = self.find_mut(sink) {
            entry.state = EntryState::Settled;
        }
    }

    fn pending_tail(&self) -> Option<SinkId> {
        let last = self.entries.last()?;
        match last.kind {
            EntryKind::Message(Role::Assistant) if last.is_open() => last.sink,
            _ => None,
        }
    }

    fn push_message(&mut self, message: Message) {
        self.entries
            .push(Entry::settled(EntryKind::Message(message.role), message.content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_clears_pending_and_accumulates() {
        let mut transcript = Transcript::new();
        let sink = transcript.create_empty();
        assert_eq!(transcript.state_of(sink), Some(EntryState::Pending));

        transcript.append(sink, "Hi");
        transcript.append(sink, " there");

        assert_eq!(transcript.text_of(sink), Some("Hi there"));
        assert_eq!(transcript.state_of(sink), Some(EntryState::Streaming));
    }

    #[test]
    fn settle_is_idempotent_and_blocks_appends() {
        let mut transcript = Transcript::new();
        let sink = transcript.create_empty();
        transcript.append(sink, "done");
        transcript.settle(sink);
        transcript.settle(sink);
        transcript.append(sink, "late");

        assert_eq!(transcript.text_of(sink), Some("done"));
        assert_eq!(transcript.state_of(sink), Some(EntryState::Settled));
    }

    #[test]
    fn unknown_sink_is_ignored() {
        let mut transcript = Transcript::new();
        transcript.append(SinkId::new(99), "x");
        transcript.settle(SinkId::new(99));
        assert!(transcript.is_empty());
    }

    #[test]
    fn pending_tail_only_matches_last_open_assistant_entry() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.pending_tail(), None);

        let sink = transcript.create_empty();
        assert_eq!(transcript.pending_tail(), Some(sink));

        transcript.append(sink, "partial");
        assert_eq!(transcript.pending_tail(), Some(sink));

        transcript.push_notice("reconnecting");
        assert_eq!(transcript.pending_tail(), None);
    }

    #[test]
    fn pending_tail_ignores_settled_entries() {
        let mut transcript = Transcript::new();
        let sink = transcript.create_empty();
        transcript.settle(sink);
        assert_eq!(transcript.pending_tail(), None);

        transcript.push_message(Message::assistant("history"));
        assert_eq!(transcript.pending_tail(), None);
    }

    #[test]
    fn sink_ids_survive_clear() {
        let mut transcript = Transcript::new();
        let first = transcript.create_empty();
        transcript.clear();
        let second = transcript.create_empty();
        assert_ne!(first, second);
        assert_eq!(transcript.text_of(first), None);
    }

    #[test]
    fn load_inserts_history_ahead_of_live_entries() {
        let mut transcript = Transcript::new();
        transcript.push_message(Message::user("now"));
        let sink = transcript.create_empty();
        transcript.load(vec![Message::user("q"), Message::assistant("a")]);

        let texts: Vec<&str> = transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["q", "a", "now", ""]);
        assert_eq!(transcript.pending_tail(), Some(sink));

        transcript.append(sink, "live");
        assert_eq!(transcript.text_of(sink), Some("live"));
    }

    #[test]
    fn prepended_notice_comes_first() {
        let mut transcript = Transcript::new();
        transcript.push_message(Message::user("hi"));
        transcript.prepend_notice("hello");
        assert_eq!(transcript.entries()[0].kind, EntryKind::Notice);
        assert_eq!(transcript.len(), 2);
    }
}
