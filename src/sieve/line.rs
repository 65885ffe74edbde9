//! Line reassembly over arbitrarily fragmented input.

use super::{classify_line, Decoder, Encoding, SieveEvent};

/// Incremental line splitter and JSON classifier.
///
/// Data fed through [`StreamSieve::observe`] is buffered until a newline
/// arrives, so the produced events do not depend on how the transport
/// fragmented the stream. Whatever remains unterminated is classified once
/// by [`StreamSieve::close`].
#[derive(Debug, Clone, Default)]
pub struct StreamSieve {
    buffer: String,
    decoder: Decoder,
    closed: bool,
}

impl StreamSieve {
    /// Create an empty sieve decoding bytes as UTF-8.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sieve for byte input in the given encoding.
    #[must_use]
    pub fn with_encoding(encoding: Encoding) -> Self {
        Self {
            decoder: Decoder::new(encoding),
            ..Self::default()
        }
    }

    /// The unterminated tail currently held.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed a text chunk, returning one event per completed line.
    pub fn observe(&mut self, chunk: &str) -> Vec<SieveEvent> {
        if self.closed {
            tracing::warn!(len = chunk.len(), "Sieve already closed, dropping data");
            return Vec::new();
        }

        // The buffer holds no newline, so only the new chunk can complete a line.
        let mut search_from = self.buffer.len();
        self.buffer.push_str(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[search_from..].find('\n') {
            let end = search_from + offset;
            events.push(classify_line(&self.buffer[consumed..end]));
            consumed = end + 1;
            search_from = consumed;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        events
    }

    /// Feed a byte chunk, decoding it with the sieve's encoding first.
    pub fn observe_bytes(&mut self, bytes: &[u8]) -> Vec<SieveEvent> {
        if self.closed {
            tracing::warn!(len = bytes.len(), "Sieve already closed, dropping data");
            return Vec::new();
        }
        let text = self.decoder.decode(bytes);
        self.observe(&text)
    }

    /// Classify the unterminated tail, if any, and stop accepting data.
    ///
    /// Calling this again is a no-op returning `None`.
    pub fn close(&mut self) -> Option<SieveEvent> {
        if self.closed {
            return None;
        }
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        self.closed = true;

        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(classify_line(&line))
    }
}
