// SPDX-License-Identifier: MIT

//! The worker state machine (spec.md §4.4): one [`WorkerHandle`] per live
//! child process, guarded by the pool's lock along with the rest of the
//! worker table.

use pool_core::{Clock, RequestId, WorkerId, WorkspaceCredentials, WorkspaceKey};
use pool_wire::ParentMessage;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Busy,
    ShuttingDown,
    Dead,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// Parent-side record of one live (or dying) worker process.
pub struct WorkerHandle {
    pub worker_id: WorkerId,
    pub workspace_key: WorkspaceKey,
    pub credentials: WorkspaceCredentials,
    pub pid: u32,
    pub socket_path: PathBuf,
    pub created_at: Instant,
    pub last_activity_at: Instant,
    pub queries_processed: u64,
    pub state: WorkerState,
    pub active_request_id: Option<RequestId>,
    pub cancel_deadline: Option<Instant>,
    /// Set once a cancel has been delivered for this handle's lifetime; per
    /// the retire-after-cancel rule the handle never returns to `Ready`
    /// again after this is set, even once the in-flight request settles.
    pub retire_after_cancel: bool,
    /// When a graceful shutdown was asked for, so the reaper can force-kill
    /// a worker that never sends `shutdown_ack`.
    pub shutdown_initiated_at: Option<Instant>,
    outbound: mpsc::UnboundedSender<ParentMessage>,
}

impl WorkerHandle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: WorkerId,
        workspace_key: WorkspaceKey,
        credentials: WorkspaceCredentials,
        pid: u32,
        socket_path: PathBuf,
        outbound: mpsc::UnboundedSender<ParentMessage>,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            worker_id,
            workspace_key,
            credentials,
            pid,
            socket_path,
            created_at: now,
            last_activity_at: now,
            queries_processed: 0,
            state: WorkerState::Starting,
            active_request_id: None,
            cancel_deadline: None,
            retire_after_cancel: false,
            shutdown_initiated_at: None,
            outbound,
        }
    }

    pub fn is_idle_and_ready(&self) -> bool {
        self.state == WorkerState::Ready && self.active_request_id.is_none()
    }

    pub fn send(&self, msg: ParentMessage) -> Result<(), mpsc::error::SendError<ParentMessage>> {
        self.outbound.send(msg)
    }

    pub fn mark_ready(&mut self) {
        self.state = WorkerState::Ready;
    }

    pub fn mark_busy(&mut self, request_id: RequestId, now: Instant) {
        self.state = WorkerState::Busy;
        self.active_request_id = Some(request_id);
        self.last_activity_at = now;
    }

    /// Clear the in-flight request on a terminal message. Returns whether
    /// the handle should be retired (transitioned to `ShuttingDown`) instead
    /// of returned to `Ready`, per the retire-after-cancel rule.
    pub fn complete_request(&mut self, now: Instant) -> bool {
        self.active_request_id = None;
        self.cancel_deadline = None;
        self.last_activity_at = now;
        self.queries_processed += 1;
        if self.retire_after_cancel {
            self.state = WorkerState::ShuttingDown;
            true
        } else {
            self.state = WorkerState::Ready;
            false
        }
    }

    pub fn begin_cancel(&mut self, cancel_deadline: Instant) {
        self.retire_after_cancel = true;
        self.cancel_deadline = Some(cancel_deadline);
    }

    pub fn begin_shutdown(&mut self, now: Instant) {
        if self.state != WorkerState::Dead {
            self.state = WorkerState::ShuttingDown;
            self.shutdown_initiated_at.get_or_insert(now);
        }
    }

    pub fn mark_dead(&mut self) {
        self.state = WorkerState::Dead;
        self.active_request_id = None;
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
