//! Event-stream framing
//!
//! Turns the raw chat byte stream into [`SseEvent`] records. Records are
//! made of `field: value` lines and end at a blank line; lines starting with
//! `:` are comments. Chunk boundaries may fall anywhere, including inside a
//! multi-byte UTF-8 sequence or between `\r` and `\n`.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::Result;

/// One event-stream record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Event type from the `event:` field, if any
    pub event: Option<String>,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event ID from the `id:` field, if any
    pub id: Option<String>,
    /// Reconnection delay in milliseconds from the `retry:` field, if any
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Event type, defaulting to `message` as the event-stream format does
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    /// Parse the data payload as JSON
    ///
    /// # Errors
    /// Returns a JSON error if the payload is not valid JSON for `T`
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

/// Incremental event-stream decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: Option<SseEvent>,
    data_lines: Vec<String>,
    /// Last chunk ended on `\r`; a leading `\n` in the next one belongs to it
    skip_lf: bool,
}

impl SseDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every record it completes
    ///
    /// Lines end at `\r\n`, `\n`, or a lone `\r`.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<SseEvent> {
        if self.skip_lf && !chunk.is_empty() {
            self.skip_lf = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') {
            let mut end = pos + 1;
            if self.buffer[pos] == b'\r' {
                match self.buffer.get(end) {
                    Some(b'\n') => end += 1,
                    None => self.skip_lf = true,
                    Some(_) => {}
                }
            }
            let line: Vec<u8> = self.buffer.drain(..end).take(pos).collect();
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the record left open when the stream ends
    pub fn finish(mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending_mut().event = Some(value.to_string()),
            "data" => {
                self.pending_mut();
                self.data_lines.push(value.to_string());
            }
            "id" => self.pending_mut().id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse() {
                    self.pending_mut().retry = Some(ms);
                }
            }
            other => tracing::trace!("Ignoring unknown event-stream field {other:?}"),
        }
        None
    }

    fn pending_mut(&mut self) -> &mut SseEvent {
        self.pending.get_or_insert_with(SseEvent::default)
    }

    /// Close the current record; records without any `data` line are dropped
    fn dispatch(&mut self) -> Option<SseEvent> {
        let mut event = self.pending.take()?;
        if self.data_lines.is_empty() {
            return None;
        }
        event.data = std::mem::take(&mut self.data_lines).join("\n");
        Some(event)
    }
}

/// Decode a chat byte stream into event-stream records
///
/// Stream errors are passed through as they arrive; decoding continues to
/// the end of the underlying stream.
pub fn decode<S>(stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        let mut stream = Box::pin(stream);
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield Ok(event);
                    }
                }
                Err(e) => yield Err(e),
            }
        }
        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    }
}
