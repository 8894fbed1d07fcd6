// SPDX-License-Identifier: MIT

//! Tagged-union message schemas for the parent↔worker wire protocol
//! (spec.md §4.2). Unknown fields are ignored by `serde`'s default
//! behavior for forward compatibility; unknown `type` tags fail to decode
//! into either enum and must be logged and dropped by the caller rather
//! than torn down as fatal (see [`crate::endpoint`]).

use pool_core::RequestId;
use serde::{Deserialize, Serialize};

/// Outcome of one query's execution, carried by `complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    pub total_messages: u64,
    pub result: Option<serde_json::Value>,
    pub cancelled: bool,
}

/// Messages sent from the parent to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParentMessage {
    Query { request_id: RequestId, payload: pool_core::AgentRequest },
    Cancel { request_id: RequestId },
    Shutdown { graceful: bool },
    HealthCheck {},
}

/// Messages sent from a worker to the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Ready {},
    Session { request_id: RequestId, session_id: String },
    Message { request_id: RequestId, content: serde_json::Value },
    Complete { request_id: RequestId, result: CompleteResult },
    Error {
        request_id: RequestId,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        stderr: Vec<String>,
    },
    ShutdownAck {},
    HealthOk { uptime_ms: u64, queries_processed: u64 },
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
