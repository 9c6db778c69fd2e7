use thiserror::Error;

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Invalid sequences become U+FFFD.
    #[default]
    Lenient,
    /// Invalid sequences abort decoding.
    Strict,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid UTF-8 sequence at stream offset {offset}")]
pub struct DecodeError {
    pub offset: usize,
}

/// Incremental UTF-8 decoder for an unframed byte stream.
///
/// Bytes of a character split across two chunks are held back until the
/// character is complete, so the concatenated output never depends on where
/// the chunk boundaries fell.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    mode: DecodeMode,
    pending: Vec<u8>,
    consumed: usize,
    dropped: usize,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: DecodeMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Feed one chunk and return every character it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<String, DecodeError> {
        if chunk.is_empty() {
            return Ok(String::new());
        }
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(error) => {
                    let valid_end = start + error.valid_up_to();
                    // valid_up_to guarantees this slice is well formed.
                    out.push_str(
                        std::str::from_utf8(&self.pending[start..valid_end]).unwrap_or_default(),
                    );
                    match error.error_len() {
                        Some(invalid_len) => {
                            if self.mode == DecodeMode::Strict {
                                let offset = self.consumed + valid_end;
                                self.consumed += self.pending.len();
                                self.pending.clear();
                                return Err(DecodeError { offset });
                            }
                            out.push(REPLACEMENT);
                            start = valid_end + invalid_len;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.consumed += start;
        self.pending.drain(..start);
        Ok(out)
    }

    /// Finish the stream. Incomplete trailing bytes are discarded.
    pub fn flush(&mut self) -> String {
        if !self.pending.is_empty() {
            tracing::debug!(
                bytes = self.pending.len(),
                "dropping incomplete UTF-8 sequence at end of stream"
            );
            self.dropped += self.pending.len();
            self.consumed += self.pending.len();
            self.pending.clear();
        }
        String::new()
    }

    /// Bytes currently held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dropped_bytes(&self) -> usize {
        self.dropped
    }
}
