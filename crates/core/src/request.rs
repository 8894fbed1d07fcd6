// SPDX-License-Identifier: MIT

//! The envelope the pool treats as opaque except for structural validation
//! at the worker boundary (spec.md §3, §4.3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which streamed message kinds a caller wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTypes {
    #[serde(default = "default_true")]
    pub session: bool,
    #[serde(default = "default_true")]
    pub message: bool,
    #[serde(default = "default_true")]
    pub complete: bool,
    #[serde(default = "default_true")]
    pub error: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StreamTypes {
    fn default() -> Self {
        Self { session: true, message: true, complete: true, error: true }
    }
}

/// Structured agent-runtime configuration; validated at the worker boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    #[serde(default)]
    pub permission_mode: String,
    #[serde(default)]
    pub setting_sources: Vec<String>,
    /// provider -> connection identifier for currently-connected OAuth-MCP servers.
    #[serde(default)]
    pub oauth_mcp_servers: BTreeMap<String, String>,
    #[serde(default)]
    pub stream_types: StreamTypes,
}

impl AgentConfig {
    pub const PLAN_MODE: &'static str = "plan";
}

/// A single user-facing prompt submitted to the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    pub agent_config: AgentConfig,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub resume: Option<String>,
    #[serde(default)]
    pub resume_session_at: Option<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default)]
    pub oauth_tokens: BTreeMap<String, String>,
    #[serde(default)]
    pub user_env_keys: BTreeMap<String, String>,
}

/// One field-level validation failure, surfaced as part of `INVALID_PAYLOAD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

/// Structural validation performed at the worker boundary before a query runs.
///
/// Returns every violation found rather than stopping at the first one, so
/// callers can report a complete `INVALID_PAYLOAD` in one round trip.
pub fn validate_agent_request(req: &AgentRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if req.message.trim().is_empty() {
        errors.push(FieldError::new("message", "must be non-empty"));
    }

    if let Some(max_turns) = req.max_turns {
        if max_turns == 0 {
            errors.push(FieldError::new("max_turns", "must be a positive integer"));
        }
    }

    for key in req.user_env_keys.keys() {
        if !is_valid_env_key(key) {
            errors.push(FieldError::new(
                "user_env_keys",
                format!("key {key:?} must match [A-Z][A-Z0-9_]*"),
            ));
        }
    }

    errors
}

fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
