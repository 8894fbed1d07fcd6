// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pool-adapters: the agent-runtime boundary (spec.md §3 "Agent runtime").
//!
//! The real runtime is an opaque streaming function supplied by the host
//! process; this crate only defines the trait it must satisfy, the tool
//! permission policy layered in front of it, and a scripted fake used by the
//! rest of the workspace's tests.

pub mod fake;
pub mod policy;
pub mod runtime;

pub use fake::ScriptedRuntime;
pub use policy::{
    build_permission_callback, decide_tool_permission, PermissionCallback, ToolPermissionDecision,
    HEAVY_BASH_DENYLIST, PLAN_MODE_BLOCKED_TOOLS,
};
pub use runtime::{AdapterError, AgentRuntime, RuntimeEvent, RuntimeStream};
