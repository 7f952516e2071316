//! Incremental decoder for server-sent event bodies
//!
//! Network chunks can end anywhere, including inside a UTF-8 sequence, so
//! bytes are buffered until a full line is available.

use thiserror::Error;

/// Longest line kept while waiting for its newline
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A line grew past the decoder's limit without a newline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SSE line exceeded {limit} bytes without a newline")]
pub struct LineTooLong {
    pub limit: usize,
}

/// One decoded `data:` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` sentinel that ends an OpenAI-style stream
    Done,
}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Feed one network chunk and return every event it completed
    ///
    /// Fails once the unterminated remainder exceeds the line limit; the
    /// decoder should not be fed again after that.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, LineTooLong> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            return Err(LineTooLong {
                limit: self.max_line,
            });
        }
        Ok(events)
    }

    /// Flush a trailing line that arrived without a newline
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        Self::parse_line(&line)
    }

    fn parse_line(line: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();

        // Comments (keep-alives), event names and blank separators carry no payload
        let data = line.strip_prefix("data:")?.trim_start();
        if data.is_empty() {
            return None;
        }
        if data == "[DONE]" {
            return Some(SseEvent::Done);
        }
        Some(SseEvent::Data(data.to_string()))
    }
}
