// SPDX-License-Identifier: MIT

//! Pool configuration (spec.md §6 "Configuration"). Deserializable from TOML
//! via the `pool-cli` `--config` loader; every field defaults to the value
//! specified there.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    Lru,
    Oldest,
    LeastUsed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_workers: usize,
    pub max_workers_per_user: usize,
    pub max_workers_per_workspace: usize,
    pub max_queued_per_user: usize,
    pub max_queued_per_workspace: usize,
    pub max_queued_global: usize,
    pub workers_per_core: usize,
    pub load_shed_threshold: usize,
    pub inactivity_timeout_ms: u64,
    pub max_age_ms: u64,
    pub ready_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub cancel_timeout_ms: u64,
    pub kill_grace_ms: u64,
    pub orphan_sweep_interval_ms: u64,
    pub orphan_max_age_ms: u64,
    pub eviction_strategy: EvictionStrategy,
    pub socket_dir: PathBuf,
    pub worker_entry_path: PathBuf,
    pub sessions_base_dir: PathBuf,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus(),
            max_workers_per_user: 1,
            max_workers_per_workspace: 1,
            max_queued_per_user: 4,
            max_queued_per_workspace: 8,
            max_queued_global: 16,
            workers_per_core: 4,
            load_shed_threshold: 100,
            inactivity_timeout_ms: 30 * 60 * 1000,
            max_age_ms: 60 * 60 * 1000,
            ready_timeout_ms: 30_000,
            shutdown_timeout_ms: 10_000,
            cancel_timeout_ms: 5_000,
            kill_grace_ms: 2_000,
            orphan_sweep_interval_ms: 30_000,
            orphan_max_age_ms: 60_000,
            eviction_strategy: EvictionStrategy::Lru,
            socket_dir: PathBuf::from("/tmp/pool/sockets"),
            worker_entry_path: PathBuf::from("poolworkerd"),
            sessions_base_dir: PathBuf::from("/tmp/pool/sessions"),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl PoolConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
    pub fn orphan_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.orphan_sweep_interval_ms)
    }
    pub fn orphan_max_age(&self) -> Duration {
        Duration::from_millis(self.orphan_max_age_ms)
    }

    /// Workspace-specific worker cap: the smaller of the configured
    /// per-workspace max and `workersPerCore × cpuCount` (spec.md §4.5).
    pub fn effective_max_workers_per_workspace(&self) -> usize {
        self.max_workers_per_workspace.min(self.workers_per_core * num_cpus())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
