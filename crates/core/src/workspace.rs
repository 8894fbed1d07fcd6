// SPDX-License-Identifier: MIT

//! Per-tenant POSIX identity and routing key.

use crate::ids::WorkspaceKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The POSIX identity and filesystem root a worker serves a workspace under.
///
/// `(uid, gid) == (0, 0)` is a reserved sentinel meaning "superuser
/// passthrough — do not drop privileges." It exists for local development
/// and tests; production workspaces must never resolve to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceCredentials {
    pub uid: u32,
    pub gid: u32,
    pub cwd: PathBuf,
    pub workspace_key: WorkspaceKey,
}

impl WorkspaceCredentials {
    /// Whether this credential pair requests the privilege-drop bypass.
    pub fn is_superuser_passthrough(&self) -> bool {
        self.uid == 0 && self.gid == 0
    }

    /// Directory-safe form of `workspace_key`, per [`sanitize_workspace_key`].
    pub fn sanitized_key(&self) -> String {
        sanitize_workspace_key(self.workspace_key.as_str())
    }
}

/// Sanitize a workspace key into a value safe to use as a single path
/// component: characters outside `[A-Za-z0-9._-]` become `_`, the result is
/// truncated to 100 characters, and an empty result becomes `"default"`.
///
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)` for all `x`, since the
/// allowed character set is closed under the substitution and truncation is
/// stable once already at or under the length cap.
pub fn sanitize_workspace_key(key: &str) -> String {
    let mut out: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    out.truncate(100);
    if out.is_empty() {
        "default".to_string()
    } else {
        out
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
