// SPDX-License-Identifier: MIT

//! Admission control and the per-workspace fair queue (spec.md §4.5). Pure,
//! synchronous bookkeeping over in-memory maps — no I/O, no locks of its own
//! — so the pool can unit-test the check order and the round-robin drain
//! without spinning up any worker process.

use crate::config::PoolConfig;
use pool_core::{AdmissionLimit, OwnerKey, PoolError, RequestId, WorkspaceKey};
use std::collections::{HashMap, VecDeque};

/// One request waiting for a worker.
pub struct QueueEntry {
    pub request_id: RequestId,
    pub owner_key: OwnerKey,
}

/// FIFO-per-owner, round-robin-across-owners queue for one workspace.
#[derive(Default)]
struct WorkspaceQueue {
    per_owner: HashMap<OwnerKey, VecDeque<RequestId>>,
    /// Owners with at least one queued entry, in the order they should be
    /// drained; rotated (not re-sorted) on every pop so head-of-line
    /// blocking by one owner never starves the others.
    owner_order: VecDeque<OwnerKey>,
}

impl WorkspaceQueue {
    fn len(&self) -> usize {
        self.per_owner.values().map(VecDeque::len).sum()
    }

    fn len_for_owner(&self, owner: &OwnerKey) -> usize {
        self.per_owner.get(owner).map_or(0, VecDeque::len)
    }

    fn push(&mut self, owner_key: OwnerKey, request_id: RequestId) {
        let entry = self.per_owner.entry(owner_key.clone()).or_default();
        if entry.is_empty() {
            self.owner_order.push_back(owner_key);
        }
        entry.push_back(request_id);
    }

    /// Pop the next entry to dispatch, rotating through owners fairly.
    fn pop(&mut self) -> Option<QueueEntry> {
        let owner_key = self.owner_order.pop_front()?;
        let queue = self.per_owner.get_mut(&owner_key)?;
        let request_id = queue.pop_front()?;
        if queue.is_empty() {
            self.per_owner.remove(&owner_key);
        } else {
            self.owner_order.push_back(owner_key.clone());
        }
        Some(QueueEntry { request_id, owner_key })
    }

    /// Remove one specific entry (queue-side cancellation), preserving
    /// ordering and owner bookkeeping for the rest.
    fn remove(&mut self, owner_key: &OwnerKey, request_id: RequestId) -> bool {
        let Some(queue) = self.per_owner.get_mut(owner_key) else { return false };
        let before = queue.len();
        queue.retain(|id| *id != request_id);
        let removed = queue.len() != before;
        if queue.is_empty() {
            self.per_owner.remove(owner_key);
            self.owner_order.retain(|k| k != owner_key);
        }
        removed
    }
}

/// Tracks queue depths and active-request counts needed for admission
/// decisions and the fair-queue drain, across all workspaces.
#[derive(Default)]
pub struct AdmissionTable {
    queues: HashMap<WorkspaceKey, WorkspaceQueue>,
    owner_queued: HashMap<OwnerKey, usize>,
    workspace_queued: HashMap<WorkspaceKey, usize>,
    global_queued: usize,
    owner_active: HashMap<OwnerKey, usize>,
    workspace_active: HashMap<WorkspaceKey, usize>,
}

pub struct AdmissionContext<'a> {
    pub shutting_down: bool,
    pub active_workers: usize,
    pub config: &'a PoolConfig,
}

impl AdmissionTable {
    pub fn global_queued(&self) -> usize {
        self.global_queued
    }

    pub fn active_for_owner(&self, owner: &OwnerKey) -> usize {
        self.owner_active.get(owner).copied().unwrap_or(0)
    }

    pub fn active_for_workspace(&self, workspace: &WorkspaceKey) -> usize {
        self.workspace_active.get(workspace).copied().unwrap_or(0)
    }

    pub fn queue_depth(&self, workspace: &WorkspaceKey) -> usize {
        self.workspace_queued.get(workspace).copied().unwrap_or(0)
    }

    /// Run the fixed check order from spec.md §4.5, rejecting with the
    /// first failing code.
    pub fn check_admission(
        &self,
        owner_key: &OwnerKey,
        workspace_key: &WorkspaceKey,
        ctx: &AdmissionContext,
    ) -> Result<(), PoolError> {
        if ctx.shutting_down {
            return Err(PoolError::ShuttingDown);
        }
        if self.global_queued >= ctx.config.max_queued_global {
            return Err(PoolError::GlobalLimit(AdmissionLimit {
                limit: ctx.config.max_queued_global as u32,
                depth: self.global_queued as u32,
            }));
        }
        if ctx.active_workers >= ctx.config.load_shed_threshold {
            return Err(PoolError::LoadShed {
                active_workers: ctx.active_workers as u32,
                threshold: ctx.config.load_shed_threshold as u32,
            });
        }
        let owner_queued = self.owner_queued.get(owner_key).copied().unwrap_or(0);
        if owner_queued >= ctx.config.max_queued_per_user {
            return Err(PoolError::UserLimit(AdmissionLimit {
                limit: ctx.config.max_queued_per_user as u32,
                depth: owner_queued as u32,
            }));
        }
        let workspace_queued = self.workspace_queued.get(workspace_key).copied().unwrap_or(0);
        if workspace_queued >= ctx.config.max_queued_per_workspace {
            return Err(PoolError::WorkspaceLimit(AdmissionLimit {
                limit: ctx.config.max_queued_per_workspace as u32,
                depth: workspace_queued as u32,
            }));
        }
        Ok(())
    }

    pub fn enqueue(&mut self, workspace_key: WorkspaceKey, owner_key: OwnerKey, request_id: RequestId) {
        self.queues.entry(workspace_key.clone()).or_default().push(owner_key.clone(), request_id);
        *self.owner_queued.entry(owner_key).or_insert(0) += 1;
        *self.workspace_queued.entry(workspace_key).or_insert(0) += 1;
        self.global_queued += 1;
    }

    /// Pop the next fairly-ordered entry for a workspace whose worker just
    /// freed up.
    pub fn dequeue(&mut self, workspace_key: &WorkspaceKey) -> Option<QueueEntry> {
        let queue = self.queues.get_mut(workspace_key)?;
        let entry = queue.pop()?;
        if queue.len() == 0 {
            self.queues.remove(workspace_key);
        }
        self.dec_queued(workspace_key, &entry.owner_key);
        Some(entry)
    }

    /// Remove a specific queued request (external cancel before dispatch).
    pub fn remove_queued(
        &mut self,
        workspace_key: &WorkspaceKey,
        owner_key: &OwnerKey,
        request_id: RequestId,
    ) -> bool {
        let Some(queue) = self.queues.get_mut(workspace_key) else { return false };
        let removed = queue.remove(owner_key, request_id);
        if removed {
            if queue.len() == 0 {
                self.queues.remove(workspace_key);
            }
            self.dec_queued(workspace_key, owner_key);
        }
        removed
    }

    fn dec_queued(&mut self, workspace_key: &WorkspaceKey, owner_key: &OwnerKey) {
        self.global_queued = self.global_queued.saturating_sub(1);
        if let Some(n) = self.workspace_queued.get_mut(workspace_key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.workspace_queued.remove(workspace_key);
            }
        }
        if let Some(n) = self.owner_queued.get_mut(owner_key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.owner_queued.remove(owner_key);
            }
        }
    }

    pub fn mark_active(&mut self, workspace_key: &WorkspaceKey, owner_key: &OwnerKey) {
        *self.workspace_active.entry(workspace_key.clone()).or_insert(0) += 1;
        *self.owner_active.entry(owner_key.clone()).or_insert(0) += 1;
    }

    /// Decrement the active counters exactly once; safe to call even if the
    /// pair was never marked (e.g. a post-admission rejection short-circuit)
    /// since the counters saturate at zero.
    pub fn mark_inactive(&mut self, workspace_key: &WorkspaceKey, owner_key: &OwnerKey) {
        if let Some(n) = self.workspace_active.get_mut(workspace_key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.workspace_active.remove(workspace_key);
            }
        }
        if let Some(n) = self.owner_active.get_mut(owner_key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.owner_active.remove(owner_key);
            }
        }
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
