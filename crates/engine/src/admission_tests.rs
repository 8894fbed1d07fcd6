// SPDX-License-Identifier: MIT

use super::*;
use crate::config::PoolConfig;

fn ctx(config: &PoolConfig) -> AdmissionContext<'_> {
    AdmissionContext { shutting_down: false, active_workers: 0, config }
}

#[test]
fn shutting_down_is_checked_first() {
    let config = PoolConfig::default();
    let table = AdmissionTable::default();
    let ctx = AdmissionContext { shutting_down: true, active_workers: 0, config: &config };
    let err = table.check_admission(&"owner".into(), &"ws".into(), &ctx).unwrap_err();
    assert!(matches!(err, PoolError::ShuttingDown));
}

#[test]
fn global_limit_rejects_once_depth_reached() {
    let mut config = PoolConfig::default();
    config.max_queued_global = 1;
    let mut table = AdmissionTable::default();
    table.enqueue("ws".into(), "owner-a".into(), RequestId::new());

    let err = table.check_admission(&"owner-b".into(), &"ws".into(), &ctx(&config)).unwrap_err();
    assert!(matches!(err, PoolError::GlobalLimit(_)));
}

#[test]
fn load_shed_rejects_when_active_workers_at_threshold() {
    let mut config = PoolConfig::default();
    config.load_shed_threshold = 2;
    let table = AdmissionTable::default();
    let ctx = AdmissionContext { shutting_down: false, active_workers: 2, config: &config };
    let err = table.check_admission(&"owner".into(), &"ws".into(), &ctx).unwrap_err();
    assert!(matches!(err, PoolError::LoadShed { .. }));
}

#[test]
fn user_limit_is_checked_before_workspace_limit() {
    let mut config = PoolConfig::default();
    config.max_queued_per_user = 1;
    config.max_queued_per_workspace = 100;
    let mut table = AdmissionTable::default();
    table.enqueue("ws".into(), "owner-a".into(), RequestId::new());

    let err = table.check_admission(&"owner-a".into(), &"ws".into(), &ctx(&config)).unwrap_err();
    assert!(matches!(err, PoolError::UserLimit(_)));
}

#[test]
fn workspace_limit_rejects_distinct_owners_sharing_a_full_workspace() {
    let mut config = PoolConfig::default();
    config.max_queued_per_user = 100;
    config.max_queued_per_workspace = 1;
    let mut table = AdmissionTable::default();
    table.enqueue("ws".into(), "owner-a".into(), RequestId::new());

    let err = table.check_admission(&"owner-b".into(), &"ws".into(), &ctx(&config)).unwrap_err();
    assert!(matches!(err, PoolError::WorkspaceLimit(_)));
}

#[test]
fn admits_when_under_every_cap() {
    let config = PoolConfig::default();
    let table = AdmissionTable::default();
    assert!(table.check_admission(&"owner".into(), &"ws".into(), &ctx(&config)).is_ok());
}

#[test]
fn fair_queue_rotates_across_owners_within_a_workspace() {
    let mut table = AdmissionTable::default();
    let ws: WorkspaceKey = "ws".into();
    let a0 = RequestId::new();
    let a1 = RequestId::new();
    let a2 = RequestId::new();
    let b0 = RequestId::new();

    table.enqueue(ws.clone(), "owner-a".into(), a0);
    table.enqueue(ws.clone(), "owner-a".into(), a1);
    table.enqueue(ws.clone(), "owner-a".into(), a2);
    table.enqueue(ws.clone(), "owner-b".into(), b0);

    // owner-a's first entry drains first (it was already at the front of the
    // rotation), then the rotation moves to owner-b before owner-a's second
    // entry, even though it arrived earlier than owner-b's.
    let first = table.dequeue(&ws).expect("first");
    assert_eq!(first.request_id, a0);
    let second = table.dequeue(&ws).expect("second");
    assert_eq!(second.request_id, b0);
    let third = table.dequeue(&ws).expect("third");
    assert_eq!(third.request_id, a1);
    let fourth = table.dequeue(&ws).expect("fourth");
    assert_eq!(fourth.request_id, a2);
    assert!(table.dequeue(&ws).is_none());
}

#[test]
fn remove_queued_drops_a_specific_entry_without_disturbing_others() {
    let mut table = AdmissionTable::default();
    let ws: WorkspaceKey = "ws".into();
    let keep = RequestId::new();
    let drop_me = RequestId::new();
    table.enqueue(ws.clone(), "owner-a".into(), keep);
    table.enqueue(ws.clone(), "owner-a".into(), drop_me);

    let removed = table.remove_queued(&ws, &"owner-a".into(), drop_me);
    assert!(removed);
    assert_eq!(table.queue_depth(&ws), 1);

    let next = table.dequeue(&ws).expect("remaining entry");
    assert_eq!(next.request_id, keep);
}

#[test]
fn active_counters_increment_and_decrement_in_pairs() {
    let mut table = AdmissionTable::default();
    let ws: WorkspaceKey = "ws".into();
    let owner: OwnerKey = "owner-a".into();
    table.mark_active(&ws, &owner);
    assert_eq!(table.active_for_workspace(&ws), 1);
    assert_eq!(table.active_for_owner(&owner), 1);

    table.mark_inactive(&ws, &owner);
    assert_eq!(table.active_for_workspace(&ws), 0);
    assert_eq!(table.active_for_owner(&owner), 0);
}
