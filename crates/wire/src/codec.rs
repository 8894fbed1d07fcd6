// SPDX-License-Identifier: MIT

//! Newline-delimited JSON framing (spec.md §4.1).
//!
//! One JSON object per line, `\n`-separated, no other framing. A rolling
//! buffer accumulates chunks and splits off complete lines as they arrive;
//! a trailing partial line stays buffered until the next `feed()`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

/// Hard cap on the rolling buffer. Exceeding it is a fatal protocol error —
/// the owning IPC endpoint must tear down rather than keep accumulating
/// unbounded memory from a misbehaving peer.
pub const MAX_FRAME_BUFFER: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame buffer exceeded {MAX_FRAME_BUFFER} bytes")]
    BufferOverflow,
}

/// One decoded unit: either a parsed message or a non-fatal per-line parse
/// failure that the decoder has already recovered from.
#[derive(Debug)]
pub enum CodecEvent<T> {
    Message(T),
    ParseError(serde_json::Error),
}

/// Incremental newline-delimited JSON decoder for messages of type `T`.
pub struct FrameDecoder<T> {
    buffer: Vec<u8>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for FrameDecoder<T> {
    fn default() -> Self {
        Self { buffer: Vec::new(), _marker: PhantomData }
    }
}

impl<T: DeserializeOwned> FrameDecoder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk of bytes, returning every complete line decoded so far
    /// in arrival order. Returns `Err` (and discards the buffer) if the
    /// rolling buffer would exceed [`MAX_FRAME_BUFFER`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<CodecEvent<T>>, CodecError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > MAX_FRAME_BUFFER {
            self.buffer.clear();
            return Err(CodecError::BufferOverflow);
        }

        let mut events = Vec::new();
        loop {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop(); // drop the trailing '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue; // empty lines are skipped per spec.md §4.1
            }
            events.push(decode_line(&line));
        }
        Ok(events)
    }

    /// Attempt to parse any residual buffered bytes (a line with no trailing
    /// `\n` yet). Returns `None` if the buffer is empty.
    pub fn flush(&mut self) -> Option<CodecEvent<T>> {
        if self.buffer.is_empty() {
            return None;
        }
        let residual = std::mem::take(&mut self.buffer);
        Some(decode_line(&residual))
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> CodecEvent<T> {
    match serde_json::from_slice::<T>(line) {
        Ok(msg) => CodecEvent::Message(msg),
        Err(e) => CodecEvent::ParseError(e),
    }
}

/// Encode one message as a single NDJSON line (JSON body + trailing `\n`).
pub fn encode_line<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    Ok(buf)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
