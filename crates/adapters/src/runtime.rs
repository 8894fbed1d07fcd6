// SPDX-License-Identifier: MIT

//! The `AgentRuntime` trait: the one abstraction boundary around the opaque
//! agent SDK (spec.md §3, §4.3). Everything above this trait — admission,
//! queueing, the worker state machine, the wire protocol — is in scope;
//! everything the real SDK does internally is not.

use crate::policy::PermissionCallback;
use async_trait::async_trait;
use futures_util::Stream;
use pool_core::AgentRequest;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("agent runtime failed to start: {0}")]
    StartFailed(String),
    /// The runtime raised an exception mid-stream, with no terminal result
    /// already observed. Carries the message, optional stack, and a bounded
    /// tail of captured stderr (spec.md §7 `AGENT_RUNTIME_ERROR`).
    #[error("agent runtime error: {message}")]
    RuntimeError { message: String, stack: Option<String>, stderr_tail: Vec<String> },
}

/// One item yielded by a running query.
///
/// `Init` must be the first item, carrying the runtime's session id. Every
/// other message is relayed to the caller verbatim as `message`. A runtime
/// that supports resumable sessions marks its own terminal message with
/// `TerminalResult` rather than plain `Message`; the worker uses that to
/// implement the "runtime threw after yielding a terminal result" success
/// case (spec.md §4.3) — the `TerminalResult` payload is still relayed to the
/// caller as an ordinary `message`, it is only special on this side of the
/// boundary.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Init { session_id: String },
    Message(serde_json::Value),
    TerminalResult(serde_json::Value),
}

pub type RuntimeStream = Pin<Box<dyn Stream<Item = Result<RuntimeEvent, AdapterError>> + Send>>;

/// Abstraction over the agent SDK's streaming query function.
///
/// A real implementation shells out to (or links) the agent SDK and proxies
/// its async message sequence through [`RuntimeEvent`]; [`fake::ScriptedRuntime`]
/// replays a fixed script for tests with neither process spawn nor privilege
/// drop involved.
#[async_trait]
pub trait AgentRuntime: Send + Sync + 'static {
    /// Start one query. `permission` is consulted by the runtime before it
    /// invokes any tool; the runtime is responsible for calling it and
    /// honoring `Deny`. `cancel` is observed by the returned stream: once
    /// fired, the stream should stop yielding further items (spec.md §4.3
    /// "check the cancellation token").
    async fn query(
        &self,
        request: &AgentRequest,
        permission: PermissionCallback,
        cancel: CancellationToken,
    ) -> Result<RuntimeStream, AdapterError>;
}
