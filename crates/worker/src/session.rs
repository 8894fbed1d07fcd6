// SPDX-License-Identifier: MIT

//! Session home resolution (spec.md §4.3 step 3, §6 session directory
//! layout): ensure the per-workspace persistent directory
//! `<sessions-base>/<sanitized-workspaceKey>/` exists, is owned by the
//! target identity, and is mode `0o700`, falling back to a private scratch
//! directory if any step fails.

use pool_core::{sanitize_workspace_key, WorkspaceKey};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub fn resolve_session_home(sessions_base_dir: &Path, workspace_key: &WorkspaceKey, uid: u32, gid: u32) -> PathBuf {
    let session_home = sessions_base_dir.join(sanitize_workspace_key(workspace_key.as_str()));

    if let Err(err) = std::fs::create_dir_all(&session_home) {
        tracing::warn!(path = %session_home.display(), error = %err, "failed to create session home, falling back to scratch dir");
        return fallback_dir();
    }
    if let Err(err) = std::fs::set_permissions(&session_home, std::fs::Permissions::from_mode(0o700)) {
        tracing::warn!(path = %session_home.display(), error = %err, "failed to set session home permissions, falling back to scratch dir");
        return fallback_dir();
    }
    if uid != 0 || gid != 0 {
        if let Err(err) =
            nix::unistd::chown(&session_home, Some(nix::unistd::Uid::from_raw(uid)), Some(nix::unistd::Gid::from_raw(gid)))
        {
            tracing::warn!(path = %session_home.display(), error = %err, "failed to chown session home, falling back to scratch dir");
            return fallback_dir();
        }
    }
    session_home
}

fn fallback_dir() -> PathBuf {
    std::env::temp_dir()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
