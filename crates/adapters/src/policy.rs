// SPDX-License-Identifier: MIT

//! Tool-permission policy evaluated in front of every tool call the agent
//! runtime wants to make (spec.md §4.3). The decision order is fixed:
//!
//! 1. deny anything in `disallowedTools`
//! 2. deny modification tools while `permissionMode == "plan"`
//! 3. deny `ExitPlanMode` unconditionally
//! 4. deny heavy Bash commands for non-superuser workspaces
//! 5. allow anything in `allowedTools`, or a tool backed by a connected
//!    OAuth-MCP server
//! 6. deny everything else
//!
//! The deny-lists are plain `const` data (spec.md §9 Open Question 3) so
//! they can be asserted against directly in tests instead of being baked
//! into unreachable match arms.

use pool_core::AgentConfig;
use std::sync::Arc;

/// Tools that write to the workspace or otherwise change agent state; these
/// are blocked outright while the agent is in plan mode.
pub const PLAN_MODE_BLOCKED_TOOLS: &[&str] =
    &["Write", "Edit", "MultiEdit", "NotebookEdit", "Bash"];

/// A tool call is denied unconditionally, independent of every other rule.
pub const UNCONDITIONALLY_DENIED_TOOLS: &[&str] = &["ExitPlanMode"];

/// Substrings identifying Bash invocations heavy enough to require
/// superuser-level trust (full-tree builds/lints/tests, unscoped recursive
/// search). Matched with `str::contains` against the full command line.
pub const HEAVY_BASH_DENYLIST: &[&str] = &[
    "cargo build --workspace",
    "cargo test --workspace",
    "cargo check --workspace",
    "cargo clippy --workspace",
    "pnpm -r ",
    "yarn workspaces",
    "npm run build --workspaces",
    "find / ",
    "find / -",
    "grep -r /",
    "grep -rn /",
    "rg --no-ignore -uuu",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPermissionDecision {
    Allow,
    Deny(String),
}

impl ToolPermissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

fn is_heavy_bash(command: &str) -> bool {
    HEAVY_BASH_DENYLIST.iter().any(|pattern| command.contains(pattern))
}

/// Extract the MCP provider name from a tool call, if it targets a
/// connected OAuth-MCP server. Tool names for MCP-backed tools follow the
/// `mcp__<provider>__<tool>` convention.
fn mcp_provider(tool_name: &str) -> Option<&str> {
    tool_name.strip_prefix("mcp__")?.split("__").next()
}

/// Evaluate the fixed decision order against one proposed tool call.
///
/// `command` is `Some` only for `Bash` calls, carrying the literal shell
/// command line. `is_superuser` reflects the workspace's passthrough
/// identity (spec.md §3 `WorkspaceCredentials::is_superuser_passthrough`).
pub fn decide_tool_permission(
    tool_name: &str,
    command: Option<&str>,
    config: &AgentConfig,
    is_superuser: bool,
) -> ToolPermissionDecision {
    if config.disallowed_tools.iter().any(|t| t == tool_name) {
        return ToolPermissionDecision::Deny(format!("{tool_name} is in disallowedTools"));
    }

    if config.permission_mode == AgentConfig::PLAN_MODE
        && PLAN_MODE_BLOCKED_TOOLS.contains(&tool_name)
    {
        return ToolPermissionDecision::Deny(format!("{tool_name} is blocked in plan mode"));
    }

    if UNCONDITIONALLY_DENIED_TOOLS.contains(&tool_name) {
        return ToolPermissionDecision::Deny(format!("{tool_name} is never permitted"));
    }

    if tool_name == "Bash" && !is_superuser {
        if let Some(cmd) = command {
            if is_heavy_bash(cmd) {
                return ToolPermissionDecision::Deny(
                    "command is a heavy repository-wide operation, requires superuser".to_string(),
                );
            }
        }
    }

    if config.allowed_tools.iter().any(|t| t == tool_name) {
        return ToolPermissionDecision::Allow;
    }

    if let Some(provider) = mcp_provider(tool_name) {
        if config.oauth_mcp_servers.contains_key(provider) {
            return ToolPermissionDecision::Allow;
        }
    }

    ToolPermissionDecision::Deny(format!("{tool_name} is not in allowedTools"))
}

pub type PermissionCallback = Arc<dyn Fn(&str, Option<&str>) -> ToolPermissionDecision + Send + Sync>;

/// Bind [`decide_tool_permission`] to one query's config/identity so the
/// runtime can call it as a plain closure per tool invocation.
pub fn build_permission_callback(config: AgentConfig, is_superuser: bool) -> PermissionCallback {
    Arc::new(move |tool_name: &str, command: Option<&str>| {
        decide_tool_permission(tool_name, command, &config, is_superuser)
    })
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
