//! Stream frame parsing.
//!
//! Decodes a raw byte stream into discrete typed frames. The wire protocol is
//! server-sent events: blank-line delimited blocks of `event:`/`data:` lines.
//! The parser buffers across chunk boundaries, so a frame split at any byte
//! offset (including mid-way through a multi-byte character) still comes out
//! whole, and a trailing unterminated frame is drained rather than dropped
//! when the stream closes. A line-delimited fallback covers transports that
//! do not advertise `text/event-stream`.

use crate::error::Error;
use crate::http::ByteStream;
use futures_util::StreamExt;
use std::collections::VecDeque;

/// Event type of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Incremental assistant text.
    Message,
    /// Normal terminal frame.
    Done,
    /// Terminal failure frame; its data is the server's error payload.
    Error,
    /// Keep-alive; carries no content.
    Heartbeat,
    /// Any other event name, passed through for the consumer to ignore.
    Other(String),
}

impl FrameEvent {
    fn from_name(name: &str) -> Self {
        match name {
            "message" => FrameEvent::Message,
            "done" => FrameEvent::Done,
            "error" => FrameEvent::Error,
            "heartbeat" => FrameEvent::Heartbeat,
            other => FrameEvent::Other(other.to_string()),
        }
    }
}

/// One decoded frame. Transient: exists only during an active stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event: FrameEvent,
    pub data: String,
}

/// Framing in effect for a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Blank-line delimited `event:`/`data:` blocks.
    Sse,
    /// Fallback: each newline-terminated chunk is one `message` frame.
    Lines,
}

impl FrameMode {
    /// Pick the framing mode from a response content type.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        if content_type.is_some_and(|ct| ct.starts_with("text/event-stream")) {
            FrameMode::Sse
        } else {
            FrameMode::Lines
        }
    }
}

/// Incremental push parser: feed raw chunks in, get complete frames out.
#[derive(Debug)]
pub struct FrameParser {
    mode: FrameMode,
    buf: Vec<u8>,
}

impl FrameParser {
    pub fn new(mode: FrameMode) -> Self {
        Self {
            mode,
            buf: Vec::new(),
        }
    }

    /// Consume a chunk, returning every frame completed by it. Incomplete
    /// trailing bytes stay buffered for the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamFrame>, Error> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, delim_len)) = self.find_boundary() {
            let block: Vec<u8> = self.buf.drain(..end + delim_len).collect();
            if let Some(frame) = self.parse_block(&block[..end])? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Drain a trailing frame that arrived without a terminating boundary.
    /// Called when the underlying stream closes so partial data is not lost.
    pub fn take_trailing(&mut self) -> Result<Option<StreamFrame>, Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let block = std::mem::take(&mut self.buf);
        self.parse_block(&block)
    }

    /// Earliest frame boundary in the buffer, as (offset, delimiter length).
    fn find_boundary(&self) -> Option<(usize, usize)> {
        match self.mode {
            FrameMode::Sse => {
                // A boundary is any line ending followed immediately by
                // another line ending; longest delimiter wins so CRLF pairs
                // are consumed whole.
                const DELIMS: [&[u8]; 4] = [b"\r\n\r\n", b"\r\n\n", b"\n\r\n", b"\n\n"];
                for i in 0..self.buf.len() {
                    for delim in DELIMS {
                        if self.buf[i..].starts_with(delim) {
                            return Some((i, delim.len()));
                        }
                    }
                }
                None
            }
            FrameMode::Lines => self
                .buf
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| (i, 1)),
        }
    }

    fn parse_block(&self, block: &[u8]) -> Result<Option<StreamFrame>, Error> {
        let text = std::str::from_utf8(block)
            .map_err(|e| Error::stream(format!("invalid UTF-8 in frame: {}", e)))?;
        match self.mode {
            FrameMode::Sse => Ok(parse_sse_block(text)),
            FrameMode::Lines => {
                let line = text.strip_suffix('\r').unwrap_or(text);
                if line.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(StreamFrame {
                        event: FrameEvent::Message,
                        data: line.to_string(),
                    }))
                }
            }
        }
    }
}

/// Parse one blank-line delimited SSE block. Comment-only and empty blocks
/// yield nothing.
fn parse_sse_block(text: &str) -> Option<StreamFrame> {
    let mut event: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            // id/retry and unknown fields are irrelevant to this protocol.
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(StreamFrame {
        event: FrameEvent::from_name(event.as_deref().unwrap_or("message")),
        data: data.join("\n"),
    })
}

/// Pulls a byte stream through a [`FrameParser`], yielding frames in arrival
/// order. Single-pass: a byte stream cannot be restarted.
pub struct FrameStream {
    inner: ByteStream,
    parser: FrameParser,
    pending: VecDeque<StreamFrame>,
    eof: bool,
}

impl FrameStream {
    pub fn new(inner: ByteStream, mode: FrameMode) -> Self {
        Self {
            inner,
            parser: FrameParser::new(mode),
            pending: VecDeque::new(),
            eof: false,
        }
    }

    /// Next frame, `Ok(None)` at end of stream. Transport failures surface as
    /// errors here so the consumer observes them instead of a silent stop;
    /// frames completed before the failure are still delivered first.
    pub async fn next_frame(&mut self) -> Result<Option<StreamFrame>, Error> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(None);
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.parser.feed(&chunk)?),
                Some(Err(e)) => {
                    self.eof = true;
                    return Err(e);
                }
                None => {
                    self.eof = true;
                    if let Some(frame) = self.parser.take_trailing()? {
                        self.pending.push_back(frame);
                    }
                }
            }
        }
    }
}
