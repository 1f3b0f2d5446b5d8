//! Chunk assembler.

use crate::sink::{OutputSink, SinkId};

/// Diagnostic counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Number of chunks appended.
    pub chunks: usize,
    /// Number of bytes appended.
    pub bytes: usize,
}

/// Appends inbound chunks to the resolved sink in arrival order.
///
/// The assembler does no buffering or reordering: every chunk goes straight to the
/// sink the controller resolved for it.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    stats: AssemblyStats,
}

impl ChunkAssembler {
    /// Create an assembler with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` to `sink` and return the sink.
    pub fn on_chunk<S>(&mut self, out: &mut S, sink: SinkId, text: &str) -> SinkId
    where
        S: OutputSink + ?Sized,
    {
        out.append(sink, text);
        self.stats.chunks += 1;
        self.stats.bytes += text.len();
        tracing::trace!(%sink, len = text.len(), chunks = self.stats.chunks, "Appended chunk");
        sink
    }

    /// Counters for the current stream.
    #[must_use]
    pub const fn stats(&self) -> AssemblyStats {
        self.stats
    }

    /// Return the counters and start a new stream.
    pub fn reset(&mut self) -> AssemblyStats {
        std::mem::take(&mut self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;

    #[test]
    fn appends_in_arrival_order() {
        let mut transcript = Transcript::new();
        let mut assembler = ChunkAssembler::new();
        let sink = transcript.create_empty();

        for chunk in ["a", "b", "", "cd"] {
            assert_eq!(assembler.on_chunk(&mut transcript, sink, chunk), sink);
        }

        assert_eq!(transcript.text_of(sink), Some("abcd"));
        assert_eq!(
            assembler.stats(),
            AssemblyStats {
                chunks: 4,
                bytes: 4
            }
        );
    }

    #[test]
    fn reset_returns_and_clears_counters() {
        let mut transcript = Transcript::new();
        let mut assembler = ChunkAssembler::new();
        let sink = transcript.create_empty();
        assembler.on_chunk(&mut transcript, sink, "héllo");

        let stats = assembler.reset();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.bytes, "héllo".len());
        assert_eq!(assembler.stats(), AssemblyStats::default());
    }
}
