// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pool-engine: the parent-side worker pool (spec.md §4, §5, §6) — admission
//! control, the fair per-workspace queue, worker process lifecycle, and the
//! background reaper that keeps both in check.

pub mod admission;
pub mod config;
pub mod events;
pub mod handle;
pub mod pool;
pub mod reaper;
pub mod spawn;

pub use admission::{AdmissionContext, AdmissionTable, QueueEntry};
pub use config::{EvictionStrategy, PoolConfig};
pub use events::{PoolErrorKind, PoolEvent};
pub use handle::{WorkerHandle, WorkerState};
pub use pool::{global, init_global, Pool, QueryHandle, QueryOptions, QueryOutcome, StreamEvent, WorkerInfo};
pub use reaper::spawn_background_tasks;
pub use spawn::{socket_path_for, ProcessSpawner, SpawnError, SpawnedWorker, WorkerSpawner};
