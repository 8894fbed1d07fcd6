// SPDX-License-Identifier: MIT

//! Monotonic counters and point-in-time pool observations (spec.md §3
//! "PoolStats"). Counters are atomics so telemetry reads never contend with
//! the worker-table lock.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic, never-reset counters tracked for the lifetime of a pool.
#[derive(Default)]
pub struct PoolCounters {
    pub spawned: AtomicU64,
    pub evicted: AtomicU64,
    pub retired_after_cancel: AtomicU64,
    pub queue_rejected_user: AtomicU64,
    pub queue_rejected_workspace: AtomicU64,
    pub queue_rejected_global: AtomicU64,
    pub queue_rejected_shedding: AtomicU64,
    pub group_terminations: AtomicU64,
    pub group_kill_escalations: AtomicU64,
    pub socket_errors: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident),+ $(,)?) => {
        impl PoolCounters {
            $(
                pub fn $field(&self) -> u64 {
                    self.$field.load(Ordering::Relaxed)
                }
            )+
        }
    };
}

counter_accessors!(
    spawned,
    evicted,
    retired_after_cancel,
    queue_rejected_user,
    queue_rejected_workspace,
    queue_rejected_global,
    queue_rejected_shedding,
    group_terminations,
    group_kill_escalations,
    socket_errors,
);

impl PoolCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolCounterSnapshot {
        PoolCounterSnapshot {
            spawned: self.spawned(),
            evicted: self.evicted(),
            retired_after_cancel: self.retired_after_cancel(),
            queue_rejected_user: self.queue_rejected_user(),
            queue_rejected_workspace: self.queue_rejected_workspace(),
            queue_rejected_global: self.queue_rejected_global(),
            queue_rejected_shedding: self.queue_rejected_shedding(),
            group_terminations: self.group_terminations(),
            group_kill_escalations: self.group_kill_escalations(),
            socket_errors: self.socket_errors(),
        }
    }
}

/// Serializable snapshot of [`PoolCounters`] for the debug endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounterSnapshot {
    pub spawned: u64,
    pub evicted: u64,
    pub retired_after_cancel: u64,
    pub queue_rejected_user: u64,
    pub queue_rejected_workspace: u64,
    pub queue_rejected_global: u64,
    pub queue_rejected_shedding: u64,
    pub group_terminations: u64,
    pub group_kill_escalations: u64,
    pub socket_errors: u64,
}

/// Point-in-time observation of pool occupancy, returned by `Pool::stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub workers_total: u32,
    pub workers_ready: u32,
    pub workers_busy: u32,
    pub queued_requests: u32,
    pub active_requests: u32,
    pub counters: PoolCounterSnapshot,
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
