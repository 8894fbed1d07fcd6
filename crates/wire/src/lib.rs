// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pool-wire: newline-delimited JSON framing and the parent↔worker IPC
//! message schemas (spec.md §4.1, §4.2).

pub mod codec;
pub mod endpoint;
pub mod messages;

pub use codec::{encode_line, CodecError, CodecEvent, FrameDecoder, MAX_FRAME_BUFFER};
pub use endpoint::{
    connect, IpcError, IpcListener, MessageReader, MessageStream, MessageWriter,
    SOCKET_CONNECT_TIMEOUT,
};
pub use messages::{CompleteResult, ParentMessage, WorkerMessage};
