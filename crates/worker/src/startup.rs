// SPDX-License-Identifier: MIT

//! Parsing the spawn contract's environment variables (spec.md §6 worker
//! spawn contract, §4.3 step 1).

use pool_core::WorkspaceKey;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid value for environment variable {0}: {1:?}")]
    InvalidEnv(&'static str, String),
}

/// Everything the parent passes a worker process at spawn time.
#[derive(Debug, Clone)]
pub struct SpawnContract {
    pub socket_path: PathBuf,
    pub workspace_key: WorkspaceKey,
    pub uid: u32,
    pub gid: u32,
    pub cwd: PathBuf,
    /// Root directory under which this workspace's persistent session home
    /// lives, per spec.md §6's `<sessions-base>/<sanitized-workspaceKey>/`
    /// layout.
    pub sessions_base_dir: PathBuf,
}

impl SpawnContract {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Parse from an arbitrary lookup function so tests don't have to touch
    /// the real process environment.
    pub fn from_vars(mut lookup: impl FnMut(&str) -> Option<String>) -> Result<Self, StartupError> {
        let socket_path = PathBuf::from(require(&mut lookup, "WORKER_SOCKET_PATH")?);
        let workspace_key = WorkspaceKey::new(require(&mut lookup, "WORKER_WORKSPACE_KEY")?);
        let uid = parse_u32(&mut lookup, "TARGET_UID")?;
        let gid = parse_u32(&mut lookup, "TARGET_GID")?;
        let cwd = PathBuf::from(require(&mut lookup, "TARGET_CWD")?);
        let sessions_base_dir = PathBuf::from(require(&mut lookup, "WORKER_SESSIONS_BASE_DIR")?);
        Ok(Self { socket_path, workspace_key, uid, gid, cwd, sessions_base_dir })
    }

    /// Whether this worker is running under the `(0, 0)` superuser
    /// passthrough sentinel and must skip privilege drop entirely.
    pub fn is_superuser_passthrough(&self) -> bool {
        self.uid == 0 && self.gid == 0
    }
}

fn require(lookup: &mut impl FnMut(&str) -> Option<String>, key: &'static str) -> Result<String, StartupError> {
    lookup(key).ok_or(StartupError::MissingEnv(key))
}

fn parse_u32(lookup: &mut impl FnMut(&str) -> Option<String>, key: &'static str) -> Result<u32, StartupError> {
    let raw = require(lookup, key)?;
    raw.parse().map_err(|_| StartupError::InvalidEnv(key, raw))
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
