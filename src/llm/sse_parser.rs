// ABOUTME: Line-buffering parser for the aggregator's SSE streaming responses
// ABOUTME: Tolerates events split across TCP reads and multiple events per read
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # SSE Stream Decoding
//!
//! The aggregator streams completions as `data: `-prefixed, newline-delimited
//! events ending with the literal sentinel `[DONE]`. TCP gives no alignment
//! guarantee between network reads and event boundaries, so decoding must
//! handle two cases correctly:
//!
//! 1. several events arriving in one read, all of which must be emitted, and
//! 2. one JSON payload split across two reads, which must be buffered until
//!    the terminating newline arrives.
//!
//! [`SseLineBuffer`] handles the framing once; the caller supplies a closure
//! that turns each JSON payload into a [`StreamChunk`]. Payloads the closure
//! cannot parse are skipped, not fatal.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A framed event extracted from the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination sentinel
    Done,
}

/// Accumulates raw bytes and yields complete SSE events
///
/// Partial trailing lines stay buffered until the next `feed` supplies the
/// rest. Non-`data` SSE fields (`event:`, `id:`, `retry:`, comments) are
/// ignored.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read's worth of bytes, returning complete events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[newline_pos + 1..].to_owned();
            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing partial line once the byte stream has ended
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        Self::parse_line(&remaining)
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(SseEvent::Done);
        }
        trimmed
            .strip_prefix("data: ")
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .map(|data| SseEvent::Data(data.to_owned()))
    }
}

struct SseStreamState {
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    stream_ended: bool,
}

impl SseStreamState {
    fn absorb<F>(&mut self, event: SseEvent, parse_data: &F)
    where
        F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
    {
        match event {
            SseEvent::Data(json_str) => {
                if let Some(result) = parse_data(&json_str) {
                    self.pending.push_back(result);
                }
            }
            SseEvent::Done => {
                self.pending.push_back(Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                }));
            }
        }
    }
}

/// Wrap a raw byte stream in SSE framing and payload parsing
///
/// `parse_data` converts one JSON payload string into a chunk; returning
/// `None` skips the event (malformed JSON, metadata-only deltas). Empty
/// non-final deltas are filtered out of the resulting stream.
pub fn create_sse_stream<S, F>(byte_stream: S, parse_data: F) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
    };

    // unfold keeps the parser state alive across awaits; each step either
    // drains a pending event or reads the next network chunk.
    let stream = unfold(
        (
            Box::pin(byte_stream)
                as Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
            state,
            parse_data,
        ),
        |(mut byte_stream, mut state, parse_data)| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, (byte_stream, state, parse_data)));
                }
                if state.stream_ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        for event in state.parser.feed(&bytes) {
                            state.absorb(event, &parse_data);
                        }
                    }
                    Some(Err(e)) => {
                        state.stream_ended = true;
                        return Some((
                            Err(AppError::external_service(
                                "aggregator",
                                format!("Stream read error: {e}"),
                            )),
                            (byte_stream, state, parse_data),
                        ));
                    }
                    None => {
                        state.stream_ended = true;
                        if let Some(event) = state.parser.flush() {
                            state.absorb(event, &parse_data);
                        }
                        if let Some(item) = state.pending.pop_front() {
                            return Some((item, (byte_stream, state, parse_data)));
                        }
                        return None;
                    }
                }
            }
        },
    );

    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_event() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"x\":1}\n\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_multiple_events_in_one_read() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_payload_split_across_reads() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: {\"content\":\"Hel").is_empty());
        let events = buffer.feed(b"lo\"}\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"content\":\"Hello\"}".to_owned())]
        );
    }

    #[test]
    fn test_done_sentinel_split_across_reads() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: [DO").is_empty());
        assert_eq!(buffer.feed(b"NE]\n"), vec![SseEvent::Done]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"x\":1}\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_non_data_fields_ignored() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"event: ping\nid: 7\n: comment\ndata: {\"x\":1}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_flush_recovers_unterminated_trailing_event() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: [DONE]").is_empty());
        assert_eq!(buffer.flush(), Some(SseEvent::Done));
        assert_eq!(buffer.flush(), None);
    }
}
