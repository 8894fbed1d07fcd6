// SPDX-License-Identifier: MIT

//! Error taxonomy shared by the engine and worker crates (spec.md §7).

use crate::request::FieldError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which admission cap rejected a request, plus its configured limit and the
/// depth observed at rejection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionLimit {
    pub limit: u32,
    pub depth: u32,
}

/// The full error taxonomy a `Pool::query` future can settle with.
///
/// Variants are grouped per spec.md §7: admission errors never contact a
/// worker; payload errors are typically caught at admission but can also
/// surface from the worker; lifecycle and runtime errors originate from a
/// live worker process; `InternalError` marks an invariant violation.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum PoolError {
    #[error("pool is shutting down")]
    ShuttingDown,

    #[error("global queue depth limit exceeded ({0:?})")]
    GlobalLimit(AdmissionLimit),

    #[error("per-user queue depth limit exceeded ({0:?})")]
    UserLimit(AdmissionLimit),

    #[error("per-workspace queue depth limit exceeded ({0:?})")]
    WorkspaceLimit(AdmissionLimit),

    #[error("load shedding active: {active_workers} active workers >= threshold {threshold}")]
    LoadShed { active_workers: u32, threshold: u32 },

    #[error("invalid payload: {0:?}")]
    InvalidPayload(Vec<FieldError>),

    #[error("failed to spawn worker: {0}")]
    WorkerSpawnFailed(String),

    #[error("worker did not become ready within the configured timeout")]
    WorkerReadyTimeout,

    #[error("worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("worker was force-killed: {0}")]
    WorkerKilled(String),

    #[error("agent runtime error: {message}")]
    AgentRuntimeError { message: String, stack: Option<String>, stderr_tail: Vec<String> },

    #[error("internal invariant violated: {0}")]
    InternalError(String),
}

impl PoolError {
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            PoolError::ShuttingDown
                | PoolError::GlobalLimit(_)
                | PoolError::UserLimit(_)
                | PoolError::WorkspaceLimit(_)
                | PoolError::LoadShed { .. }
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
