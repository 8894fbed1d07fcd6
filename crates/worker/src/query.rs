// SPDX-License-Identifier: MIT

//! Driving one query through the agent runtime boundary (spec.md §4.3).

use futures_util::StreamExt;
use pool_adapters::{build_permission_callback, AdapterError, AgentRuntime, RuntimeEvent};
use pool_core::{validate_agent_request, AgentRequest, RequestId};
use pool_wire::{CompleteResult, WorkerMessage};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Run one query to completion against `runtime`, returning every
/// `WorkerMessage` it should be relayed to the parent as, in order.
///
/// `previously_set_env` carries the set of `user_env_keys` names this
/// worker applied for its prior query (empty on the worker's first query);
/// the caller should store the returned set back for the next call, so the
/// environment never leaks a prior tenant's keys into the next query on the
/// same long-lived worker process (spec.md §4.3, §7 workspace isolation).
///
/// `cancel` is handed straight to the runtime and also consulted here once
/// the stream ends, so `CompleteResult.cancelled` reflects whether the token
/// actually fired rather than whether the runtime happened to run dry.
pub async fn run_query(
    runtime: &dyn AgentRuntime,
    request_id: RequestId,
    payload: AgentRequest,
    is_superuser: bool,
    previously_set_env: &HashSet<String>,
    cancel: CancellationToken,
) -> (Vec<WorkerMessage>, HashSet<String>) {
    let mut out = Vec::new();

    let field_errors = validate_agent_request(&payload);
    if !field_errors.is_empty() {
        out.push(WorkerMessage::Error {
            request_id,
            error: "invalid payload".to_string(),
            stack: None,
            stderr: field_errors.into_iter().map(|e| format!("{}: {}", e.field, e.reason)).collect(),
        });
        return (out, previously_set_env.clone());
    }

    let now_set = apply_query_environment(&payload, previously_set_env);

    let permission = build_permission_callback(payload.agent_config.clone(), is_superuser);
    let mut stream = match runtime.query(&payload, permission, cancel.clone()).await {
        Ok(stream) => stream,
        Err(err) => {
            out.push(adapter_error_to_message(request_id, err));
            return (out, now_set);
        }
    };

    let mut total_messages = 0u64;
    let mut terminal_result = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(RuntimeEvent::Init { session_id }) => out.push(WorkerMessage::Session { request_id, session_id }),
            Ok(RuntimeEvent::Message(content)) => {
                total_messages += 1;
                out.push(WorkerMessage::Message { request_id, content });
            }
            Ok(RuntimeEvent::TerminalResult(value)) => {
                total_messages += 1;
                out.push(WorkerMessage::Message { request_id, content: value.clone() });
                terminal_result = Some(value);
            }
            Err(err) => {
                if let Some(result) = terminal_result.take() {
                    // The runtime already yielded its terminal result; a
                    // failure afterward is SDK teardown noise, not a query
                    // failure (spec.md §4.3).
                    out.push(WorkerMessage::Complete {
                        request_id,
                        result: CompleteResult {
                            total_messages,
                            result: Some(result),
                            cancelled: cancel.is_cancelled(),
                        },
                    });
                    return (out, now_set);
                }
                out.push(adapter_error_to_message(request_id, err));
                return (out, now_set);
            }
        }
    }

    out.push(WorkerMessage::Complete {
        request_id,
        result: CompleteResult { total_messages, result: terminal_result, cancelled: cancel.is_cancelled() },
    });
    (out, now_set)
}

fn adapter_error_to_message(request_id: RequestId, err: AdapterError) -> WorkerMessage {
    match err {
        AdapterError::StartFailed(message) => WorkerMessage::Error { request_id, error: message, stack: None, stderr: Vec::new() },
        AdapterError::RuntimeError { message, stack, stderr_tail } => {
            WorkerMessage::Error { request_id, error: message, stack, stderr: stderr_tail }
        }
    }
}

/// Reset the `user_env_keys` and session-scoped variables this process
/// exposes to the agent runtime between queries: unset whatever the
/// previous query set, then apply this one's.
fn apply_query_environment(payload: &AgentRequest, previously_set: &HashSet<String>) -> HashSet<String> {
    for key in previously_set {
        std::env::remove_var(key);
    }

    let mut now_set = HashSet::new();
    for (key, value) in &payload.user_env_keys {
        std::env::set_var(key, value);
        now_set.insert(key.clone());
    }

    match &payload.session_cookie {
        Some(cookie) => std::env::set_var("ALIVE_SESSION_COOKIE", cookie),
        None => std::env::remove_var("ALIVE_SESSION_COOKIE"),
    }
    match &payload.api_key {
        Some(key) => std::env::set_var("ANTHROPIC_API_KEY", key),
        None => std::env::remove_var("ANTHROPIC_API_KEY"),
    }

    now_set
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
