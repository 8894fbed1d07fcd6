// SPDX-License-Identifier: MIT

//! Worker process spawning (spec.md §4.2 "spawn contract", §6 "Worker spawn
//! contract"): build a `tokio::process::Command` with the documented
//! environment, spawn it, and hand the child off to a reaper task so it's
//! never left a zombie.

use async_trait::async_trait;
use pool_core::{PoolError, WorkspaceCredentials, WorkspaceKey};
use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn worker process: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SpawnError> for PoolError {
    fn from(err: SpawnError) -> Self {
        PoolError::WorkerSpawnFailed(err.to_string())
    }
}

/// A freshly spawned worker process, before it has connected or sent `ready`.
pub struct SpawnedWorker {
    pub pid: u32,
    pub child: tokio::process::Child,
}

/// Abstraction over "start the program that will speak the worker protocol
/// on `socket_path`", so tests can substitute a cooperative fixture binary
/// for the real `poolworkerd` entry point without changing any pool logic.
#[async_trait]
pub trait WorkerSpawner: Send + Sync + 'static {
    async fn spawn(
        &self,
        credentials: &WorkspaceCredentials,
        socket_path: &Path,
    ) -> Result<SpawnedWorker, SpawnError>;
}

/// Production spawner: execs the configured worker entry binary with the
/// environment contract from spec.md §6.
pub struct ProcessSpawner {
    pub worker_entry_path: PathBuf,
    /// Root directory under which each workspace gets its own persistent
    /// session home, forwarded to the child as `WORKER_SESSIONS_BASE_DIR`
    /// (spec.md §6 session directory layout).
    pub sessions_base_dir: PathBuf,
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(
        &self,
        credentials: &WorkspaceCredentials,
        socket_path: &Path,
    ) -> Result<SpawnedWorker, SpawnError> {
        let mut cmd = Command::new(&self.worker_entry_path);
        cmd.env("WORKER_SOCKET_PATH", socket_path)
            .env("WORKER_WORKSPACE_KEY", credentials.workspace_key.as_str())
            .env("TARGET_UID", credentials.uid.to_string())
            .env("TARGET_GID", credentials.gid.to_string())
            .env("TARGET_CWD", &credentials.cwd)
            .env("WORKER_SESSIONS_BASE_DIR", &self.sessions_base_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            // New process group so the reaper can signal the worker and
            // whatever it spawns (the agent runtime's own children) with one
            // `killpg`, per spec.md §4.4's cleanup step 3.
            .process_group(0);

        let child = cmd.spawn()?;
        let pid = child.id().ok_or_else(|| {
            SpawnError::Io(std::io::Error::other("spawned child has no pid"))
        })?;
        Ok(SpawnedWorker { pid, child })
    }
}

/// Build the per-worker socket path for a workspace, per spec.md §6's socket
/// directory layout (`<workspaceKey>-<shortRand>.sock`).
pub fn socket_path_for(socket_dir: &Path, workspace_key: &WorkspaceKey) -> PathBuf {
    let suffix: String =
        rand::thread_rng().sample_iter(rand::distributions::Alphanumeric).take(6).map(char::from).collect();
    socket_dir.join(format!("{}-{}.sock", workspace_key.as_str(), suffix.to_lowercase()))
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
