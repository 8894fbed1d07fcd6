// SPDX-License-Identifier: MIT

//! Background maintenance (spec.md §4.6): recycle workers that have sat idle
//! or live too long, sweep orphaned sockets, and force-kill anything stuck
//! past its shutdown deadline. Three independent `tokio::time::interval`
//! loops, all cancellable from one shared `CancellationToken`.

use crate::config::PoolConfig;
use crate::handle::WorkerState;
use crate::pool::Pool;
use crate::spawn::WorkerSpawner;
use pool_core::{Clock, WorkerId};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spawn the idle-recycle, max-age-recycle, and orphan-sweep loops. Returns
/// immediately; the loops run until `shutdown` is cancelled.
pub fn spawn_background_tasks<S, C>(pool: Arc<Pool<S, C>>, shutdown: CancellationToken)
where
    S: WorkerSpawner,
    C: Clock,
{
    tokio::spawn(recycle_loop(Arc::clone(&pool), shutdown.clone()));
    tokio::spawn(orphan_sweep_loop(pool, shutdown));
}

/// Idle-timeout and max-age recycling: one interval loop covers both, since
/// both just mean "this worker has outlived a deadline; politely ask it to
/// shut down."
async fn recycle_loop<S, C>(pool: Arc<Pool<S, C>>, shutdown: CancellationToken)
where
    S: WorkerSpawner,
    C: Clock,
{
    let mut ticker = tokio::time::interval(recycle_tick(&pool.config()));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => sweep_expired_workers(&pool),
        }
    }
}

fn recycle_tick(config: &PoolConfig) -> std::time::Duration {
    // Check substantially more often than the shortest configured deadline
    // so recycling stays responsive without spinning.
    (config.inactivity_timeout().min(config.max_age()) / 4).max(std::time::Duration::from_secs(1))
}

fn sweep_expired_workers<S, C>(pool: &Arc<Pool<S, C>>)
where
    S: WorkerSpawner,
    C: Clock,
{
    let now = pool.clock_now();
    for (worker_id, reason) in pool.workers_past_deadline(now) {
        tracing::info!(worker_id = %worker_id, reason = %reason, "recycling worker");
        pool.begin_recycle(&worker_id);
    }
    for worker_id in pool.workers_stuck_shutting_down(now) {
        tracing::warn!(worker_id = %worker_id, "worker ignored graceful shutdown, force-killing");
        pool.force_kill_worker(&worker_id);
    }
}

/// Periodically remove worker socket files under `socket_dir` that don't
/// belong to any live worker record — left behind by a crash between bind
/// and accept, or a parent restart.
async fn orphan_sweep_loop<S, C>(pool: Arc<Pool<S, C>>, shutdown: CancellationToken)
where
    S: WorkerSpawner,
    C: Clock,
{
    let mut ticker = tokio::time::interval(pool.config().orphan_sweep_interval());
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => sweep_orphan_sockets(&pool),
        }
    }
}

fn sweep_orphan_sockets<S, C>(pool: &Arc<Pool<S, C>>)
where
    S: WorkerSpawner,
    C: Clock,
{
    let socket_dir = &pool.config().socket_dir;
    let Ok(entries) = std::fs::read_dir(socket_dir) else { return };
    let live_paths = pool.live_socket_paths();
    let max_age = pool.config().orphan_max_age();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sock") {
            continue;
        }
        if live_paths.contains(&path) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if modified.elapsed().map(|age| age > max_age).unwrap_or(false) {
            tracing::info!(path = %path.display(), "removing orphaned worker socket");
            let _ = std::fs::remove_file(&path);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecycleReason {
    Idle,
    MaxAge,
}

impl std::fmt::Display for RecycleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle timeout"),
            Self::MaxAge => write!(f, "max age"),
        }
    }
}

/// Determine whether an idle-and-ready worker's deadline has passed. Kept
/// free of `Pool` internals so it's unit-testable against bare instants.
pub(crate) fn deadline_reason(
    state: WorkerState,
    created_at: Instant,
    last_activity_at: Instant,
    now: Instant,
    config: &PoolConfig,
) -> Option<RecycleReason> {
    if state != WorkerState::Ready {
        return None;
    }
    if now.duration_since(created_at) >= config.max_age() {
        return Some(RecycleReason::MaxAge);
    }
    if now.duration_since(last_activity_at) >= config.inactivity_timeout() {
        return Some(RecycleReason::Idle);
    }
    None
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
