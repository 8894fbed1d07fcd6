// SPDX-License-Identifier: MIT

//! Observer-pattern events emitted by the pool (spec.md §4.6), fanned out
//! via a `tokio::sync::broadcast` channel rather than callback registration.

use pool_core::{OwnerKey, PoolError, RequestId, WorkerId, WorkspaceKey};

#[derive(Debug, Clone)]
pub enum PoolEvent {
    WorkerSpawned { worker_id: WorkerId, workspace_key: WorkspaceKey },
    WorkerReady { worker_id: WorkerId },
    WorkerBusy { worker_id: WorkerId, request_id: RequestId },
    WorkerIdle { worker_id: WorkerId },
    WorkerCrashed { worker_id: WorkerId, reason: String },
    WorkerTerminated { worker_id: WorkerId, pid: u32, reason: String },
    RequestAdmitted { request_id: RequestId, owner_key: OwnerKey, workspace_key: WorkspaceKey },
    RequestQueued { request_id: RequestId, owner_key: OwnerKey, workspace_key: WorkspaceKey },
    RequestRejected { request_id: RequestId, error: PoolErrorKind },
    RequestCompleted { request_id: RequestId, total_messages: u64, cancelled: bool },
    RequestFailed { request_id: RequestId, error: PoolErrorKind },
}

/// A cloneable summary of [`PoolError`] suitable for carrying on an event
/// broadcast; `PoolError` itself is not `Clone` since some variants carry
/// owned diagnostic strings that don't need duplicating per subscriber.
#[derive(Debug, Clone)]
pub struct PoolErrorKind(pub String);

impl From<&PoolError> for PoolErrorKind {
    fn from(err: &PoolError) -> Self {
        Self(err.to_string())
    }
}
