// SPDX-License-Identifier: MIT

//! A scripted [`AgentRuntime`] double used by `pool-engine`'s and
//! `pool-worker`'s tests: a deterministic stand-in that records calls and
//! replays a fixed, caller-authored sequence instead of touching a real
//! process or SDK.

use crate::policy::PermissionCallback;
use crate::runtime::{AdapterError, AgentRuntime, RuntimeEvent, RuntimeStream};
use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;
use pool_core::AgentRequest;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One step of a scripted query.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Init(String),
    Message(serde_json::Value),
    TerminalResult(serde_json::Value),
    /// Yield nothing but wait, to give cancellation tests room to act.
    Delay(Duration),
    /// End the stream with a runtime error instead of a clean finish.
    Fail(String),
}

/// Records every call received by [`ScriptedRuntime::query`] for assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub message: String,
    pub permission_probe: Option<(String, Option<String>)>,
}

/// A fake [`AgentRuntime`] that replays one fixed script for every query.
///
/// Construct with [`ScriptedRuntime::new`], optionally probing the supplied
/// permission callback with [`ScriptedRuntime::probe_tool`] before playing
/// the script out, so tests can assert on both the permission decision and
/// the resulting message stream in one runtime instance.
pub struct ScriptedRuntime {
    script: Vec<ScriptStep>,
    probe_tool: Option<(String, Option<String>)>,
    calls: Arc<Mutex<Vec<RecordedQuery>>>,
}

impl ScriptedRuntime {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self { script, probe_tool: None, calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// A minimal script: init, one message, terminal result, clean end.
    pub fn happy_path(session_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self::new(vec![
            ScriptStep::Init(session_id.into()),
            ScriptStep::Message(serde_json::json!({"role": "assistant", "text": "working"})),
            ScriptStep::TerminalResult(result),
        ])
    }

    /// Call `permission` with `(tool_name, command)` before replaying the
    /// script, so tests can assert a policy decision was honored.
    pub fn probing_tool(mut self, tool_name: impl Into<String>, command: Option<String>) -> Self {
        self.probe_tool = Some((tool_name.into(), command));
        self
    }

    pub fn calls(&self) -> Vec<RecordedQuery> {
        self.calls.lock().clone()
    }
}

struct ScriptCursor {
    steps: VecDeque<ScriptStep>,
    cancel: CancellationToken,
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn query(
        &self,
        request: &AgentRequest,
        permission: PermissionCallback,
        cancel: CancellationToken,
    ) -> Result<RuntimeStream, AdapterError> {
        if let Some((tool, command)) = &self.probe_tool {
            let decision = permission(tool, command.as_deref());
            tracing::debug!(?decision, tool, "scripted runtime probed permission callback");
        }

        self.calls.lock().push(RecordedQuery {
            message: request.message.clone(),
            permission_probe: self.probe_tool.clone(),
        });

        let cursor = ScriptCursor { steps: self.script.clone().into(), cancel };
        let stream = stream::unfold(cursor, |mut cursor| async move {
            loop {
                if cursor.cancel.is_cancelled() {
                    return None;
                }
                let step = cursor.steps.pop_front()?;
                match step {
                    ScriptStep::Init(session_id) => {
                        return Some((Ok(RuntimeEvent::Init { session_id }), cursor));
                    }
                    ScriptStep::Message(v) => {
                        return Some((Ok(RuntimeEvent::Message(v)), cursor));
                    }
                    ScriptStep::TerminalResult(v) => {
                        return Some((Ok(RuntimeEvent::TerminalResult(v)), cursor));
                    }
                    ScriptStep::Delay(d) => {
                        tokio::select! {
                            () = tokio::time::sleep(d) => continue,
                            () = cursor.cancel.cancelled() => return None,
                        }
                    }
                    ScriptStep::Fail(message) => {
                        return Some((
                            Err(AdapterError::RuntimeError {
                                message,
                                stack: None,
                                stderr_tail: Vec::new(),
                            }),
                            cursor,
                        ));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
