//! Incremental server-sent events decoder
//!
//! Bytes may split lines and UTF-8 sequences anywhere; only complete lines
//! are decoded.

/// Decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line
    Data(String),
    /// `data: [DONE]` terminator
    Done,
}

/// Line-buffering SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create empty decoder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                events.push(SseEvent::Done);
            } else if !data.is_empty() {
                events.push(SseEvent::Data(data.to_string()));
            }
        }
        events
    }
}
