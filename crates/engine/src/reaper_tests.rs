// SPDX-License-Identifier: MIT

use super::*;
use crate::config::PoolConfig;
use std::time::Duration;

fn config() -> PoolConfig {
    let mut config = PoolConfig::default();
    config.inactivity_timeout_ms = 1_000;
    config.max_age_ms = 10_000;
    config
}

#[test]
fn busy_worker_never_gets_a_deadline() {
    let config = config();
    let now = Instant::now();
    let reason = deadline_reason(WorkerState::Busy, now, now, now + Duration::from_secs(100), &config);
    assert!(reason.is_none());
}

#[test]
fn idle_worker_past_inactivity_timeout_is_recycled() {
    let config = config();
    let created_at = Instant::now();
    let last_activity_at = created_at;
    let now = created_at + Duration::from_millis(1_500);
    let reason = deadline_reason(WorkerState::Ready, created_at, last_activity_at, now, &config);
    assert_eq!(reason, Some(RecycleReason::Idle));
}

#[test]
fn worker_past_max_age_is_recycled_even_if_recently_active() {
    let config = config();
    let created_at = Instant::now();
    let last_activity_at = created_at + Duration::from_millis(9_900);
    let now = created_at + Duration::from_millis(10_000);
    let reason = deadline_reason(WorkerState::Ready, created_at, last_activity_at, now, &config);
    assert_eq!(reason, Some(RecycleReason::MaxAge));
}

#[test]
fn fresh_idle_worker_has_no_deadline_yet() {
    let config = config();
    let created_at = Instant::now();
    let now = created_at + Duration::from_millis(100);
    let reason = deadline_reason(WorkerState::Ready, created_at, created_at, now, &config);
    assert!(reason.is_none());
}
