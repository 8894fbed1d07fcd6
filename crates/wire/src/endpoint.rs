// SPDX-License-Identifier: MIT

//! Parent-side listener and worker-side connector over a per-worker
//! Unix-domain socket (spec.md §4.2).
//!
//! Both sides speak the same framing: NDJSON lines decoded through
//! [`FrameDecoder`]. A line whose shape doesn't match the expected tagged
//! union (unknown `type`, missing fields, wrong field kinds) fails to
//! deserialize and is logged and dropped by [`MessageStream::recv`] rather
//! than tearing down the connection — only a buffer overflow is fatal.

use crate::codec::{encode_line, CodecError, CodecEvent, FrameDecoder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Bound on how long a worker waits to connect to its socket after spawn.
pub const SOCKET_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("fatal protocol error: {0}")]
    Fatal(#[from] CodecError),
    #[error("timed out connecting to worker socket")]
    ConnectTimeout,
}

/// A bidirectional NDJSON message channel over one `UnixStream`.
///
/// `In` is the type this side reads, `Out` is the type this side writes —
/// a parent-side stream is `MessageStream<WorkerMessage, ParentMessage>`
/// and a worker-side stream is its mirror image.
pub struct MessageStream<In, Out> {
    stream: UnixStream,
    decoder: FrameDecoder<In>,
    pending: VecDeque<In>,
    _out: PhantomData<fn(Out)>,
}

impl<In: DeserializeOwned, Out: Serialize> MessageStream<In, Out> {
    pub fn new(stream: UnixStream) -> Self {
        Self { stream, decoder: FrameDecoder::new(), pending: VecDeque::new(), _out: PhantomData }
    }

    /// Serialize and write one message as a single NDJSON line.
    pub async fn send(&mut self, msg: &Out) -> Result<(), IpcError> {
        let buf = encode_line(msg)?;
        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Read the next well-formed message, skipping malformed lines. Returns
    /// `Ok(None)` on a clean peer disconnect, `Err` only on a fatal framing
    /// error (buffer overflow) or I/O failure.
    pub async fn recv(&mut self) -> Result<Option<In>, IpcError> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Ok(Some(msg));
            }

            let mut buf = [0u8; 8192];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                if let Some(event) = self.decoder.flush() {
                    match event {
                        CodecEvent::Message(m) => return Ok(Some(m)),
                        CodecEvent::ParseError(e) => {
                            tracing::warn!(error = %e, "dropping malformed trailing line on eof");
                        }
                    }
                }
                return Ok(None);
            }

            for event in self.decoder.feed(&buf[..n])? {
                match event {
                    CodecEvent::Message(m) => self.pending.push_back(m),
                    CodecEvent::ParseError(e) => {
                        tracing::warn!(error = %e, "dropping malformed line, peer not trusted");
                    }
                }
            }
        }
    }

    /// Split into independent read/write halves so a driver task can hold
    /// one in each branch of a `select!` loop without double-borrowing the
    /// underlying socket.
    pub fn into_split(self) -> (MessageReader<In>, MessageWriter<Out>) {
        let (read, write) = self.stream.into_split();
        (
            MessageReader { read, decoder: self.decoder, pending: self.pending },
            MessageWriter { write, _out: PhantomData },
        )
    }
}

/// Read half of a split [`MessageStream`].
pub struct MessageReader<In> {
    read: tokio::net::unix::OwnedReadHalf,
    decoder: FrameDecoder<In>,
    pending: VecDeque<In>,
}

impl<In: DeserializeOwned> MessageReader<In> {
    pub async fn recv(&mut self) -> Result<Option<In>, IpcError> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Ok(Some(msg));
            }

            let mut buf = [0u8; 8192];
            let n = self.read.read(&mut buf).await?;
            if n == 0 {
                if let Some(event) = self.decoder.flush() {
                    match event {
                        CodecEvent::Message(m) => return Ok(Some(m)),
                        CodecEvent::ParseError(e) => {
                            tracing::warn!(error = %e, "dropping malformed trailing line on eof");
                        }
                    }
                }
                return Ok(None);
            }

            for event in self.decoder.feed(&buf[..n])? {
                match event {
                    CodecEvent::Message(m) => self.pending.push_back(m),
                    CodecEvent::ParseError(e) => {
                        tracing::warn!(error = %e, "dropping malformed line, peer not trusted");
                    }
                }
            }
        }
    }
}

/// Write half of a split [`MessageStream`].
pub struct MessageWriter<Out> {
    write: tokio::net::unix::OwnedWriteHalf,
    _out: PhantomData<fn(Out)>,
}

impl<Out: Serialize> MessageWriter<Out> {
    pub async fn send(&mut self, msg: &Out) -> Result<(), IpcError> {
        let buf = encode_line(msg)?;
        self.write.write_all(&buf).await?;
        Ok(())
    }
}

/// Parent-side listener bound to one worker's socket path.
pub struct IpcListener {
    listener: UnixListener,
}

impl IpcListener {
    /// Bind a listener at `socket_path`. The caller is responsible for
    /// ensuring the containing directory has mode `0o700` and is owned by
    /// the parent (spec.md §4.2/§6).
    pub fn bind(socket_path: &Path) -> Result<Self, IpcError> {
        let _ = std::fs::remove_file(socket_path);
        let listener = UnixListener::bind(socket_path)?;
        Ok(Self { listener })
    }

    /// Accept the worker's single connection.
    pub async fn accept<In: DeserializeOwned, Out: Serialize>(
        &self,
    ) -> Result<MessageStream<In, Out>, IpcError> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(MessageStream::new(stream))
    }
}

/// Worker-side connector with a bounded connect timeout.
pub async fn connect<In: DeserializeOwned, Out: Serialize>(
    socket_path: &Path,
) -> Result<MessageStream<In, Out>, IpcError> {
    let stream = tokio::time::timeout(SOCKET_CONNECT_TIMEOUT, UnixStream::connect(socket_path))
        .await
        .map_err(|_| IpcError::ConnectTimeout)??;
    Ok(MessageStream::new(stream))
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
