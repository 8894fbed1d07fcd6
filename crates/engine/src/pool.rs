// SPDX-License-Identifier: MIT

//! The pool manager (spec.md §4, §5): admits requests, drives each worker's
//! socket, and resolves every in-flight query exactly once. One
//! `Mutex`-guarded table of live records, atomics for the counters that
//! telemetry reads without contending on that lock, and a `broadcast`
//! channel for anyone watching pool-wide events.

use crate::admission::{AdmissionContext, AdmissionTable};
use crate::config::PoolConfig;
use crate::events::{PoolErrorKind, PoolEvent};
use crate::handle::{WorkerHandle, WorkerState};
use crate::spawn::{socket_path_for, ProcessSpawner, WorkerSpawner};
use pool_core::{
    validate_agent_request, AgentRequest, Clock, OwnerKey, PoolCounters, PoolError, PoolStats,
    RequestId, SystemClock, WorkerId, WorkspaceCredentials, WorkspaceKey,
};
use pool_wire::{IpcListener, ParentMessage, WorkerMessage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

/// One streamed item a caller receives while its query is in flight.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Session { session_id: String },
    Message { content: serde_json::Value },
}

/// Terminal outcome of a query that reached `complete` (including a
/// cooperative cancellation, which is still a success per spec.md §4.3).
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub total_messages: u64,
    pub result: Option<serde_json::Value>,
    pub cancelled: bool,
}

/// What a caller submits to [`Pool::query`].
pub struct QueryOptions {
    pub owner_key: OwnerKey,
    pub credentials: WorkspaceCredentials,
    pub payload: AgentRequest,
    pub cancel: CancellationToken,
}

/// What a caller gets back immediately: a stream of `onMessage`-style
/// events and a future that resolves once, with the terminal result or the
/// rejection/failure that ended the request.
pub struct QueryHandle {
    pub request_id: RequestId,
    pub events: UnboundedReceiverStream<StreamEvent>,
    pub result: oneshot::Receiver<Result<QueryOutcome, PoolError>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub workspace_key: WorkspaceKey,
    pub pid: u32,
    pub state: String,
    pub queries_processed: u64,
}

enum PendingLocation {
    Queued,
    Dispatched(WorkerId),
}

struct PendingRequest {
    owner_key: OwnerKey,
    workspace_key: WorkspaceKey,
    payload: AgentRequest,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    result_tx: Option<oneshot::Sender<Result<QueryOutcome, PoolError>>>,
    location: PendingLocation,
    message_count: u64,
}

enum DispatchAction {
    Dispatch { worker_id: WorkerId, request_id: RequestId, owner_key: OwnerKey },
    Spawn,
    Evict { worker_id: WorkerId },
    Wait,
}

enum CancelAction {
    ResolveQueued,
    WatchWorker(WorkerId),
    None,
}

#[derive(Default)]
struct PoolState {
    workers: HashMap<WorkerId, WorkerHandle>,
    admission: AdmissionTable,
    pending: HashMap<RequestId, PendingRequest>,
    shutting_down: bool,
}

/// The worker pool manager. Generic over the spawner and clock so tests can
/// substitute the cooperative fixture binary and a `FakeClock`; production
/// code uses [`Pool::global`], which is `Pool<ProcessSpawner, SystemClock>`.
pub struct Pool<S: WorkerSpawner = ProcessSpawner, C: Clock = SystemClock> {
    config: PoolConfig,
    state: Mutex<PoolState>,
    counters: PoolCounters,
    events: broadcast::Sender<PoolEvent>,
    spawner: S,
    clock: C,
}

impl<S: WorkerSpawner, C: Clock> Pool<S, C> {
    pub fn new(config: PoolConfig, spawner: S, clock: C) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self { config, state: Mutex::new(PoolState::default()), counters: PoolCounters::default(), events, spawner, clock })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn counters(&self) -> &PoolCounters {
        &self.counters
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    /// Admit and (eventually) dispatch one query. Returns immediately; the
    /// returned handle settles once the request is rejected, completed, or
    /// killed.
    pub async fn query(self: &Arc<Self>, options: QueryOptions) -> QueryHandle {
        let request_id = RequestId::new();
        let owner_key = options.owner_key;
        let workspace_key = options.credentials.workspace_key.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        let field_errors = validate_agent_request(&options.payload);
        if !field_errors.is_empty() {
            let _ = result_tx.send(Err(PoolError::InvalidPayload(field_errors)));
            return QueryHandle { request_id, events: UnboundedReceiverStream::new(events_rx), result: result_rx };
        }

        let admitted = {
            let mut state = self.state.lock();
            let active_workers = state.workers.values().filter(|w| !w.state.is_terminal()).count();
            let ctx = AdmissionContext { shutting_down: state.shutting_down, active_workers, config: &self.config };
            match state.admission.check_admission(&owner_key, &workspace_key, &ctx) {
                Ok(()) => {
                    state.admission.enqueue(workspace_key.clone(), owner_key.clone(), request_id);
                    state.pending.insert(
                        request_id,
                        PendingRequest {
                            owner_key: owner_key.clone(),
                            workspace_key: workspace_key.clone(),
                            payload: options.payload,
                            events_tx,
                            result_tx: Some(result_tx),
                            location: PendingLocation::Queued,
                            message_count: 0,
                        },
                    );
                    let _ = self.events.send(PoolEvent::RequestQueued {
                        request_id,
                        owner_key: owner_key.clone(),
                        workspace_key: workspace_key.clone(),
                    });
                    true
                }
                Err(err) => {
                    self.record_rejection(&err);
                    let _ = self.events.send(PoolEvent::RequestRejected { request_id, error: (&err).into() });
                    let _ = result_tx.send(Err(err));
                    false
                }
            }
        };

        if admitted {
            self.spawn_cancel_watcher(request_id, options.cancel);
            self.maybe_dispatch(workspace_key, options.credentials).await;
        }

        QueryHandle { request_id, events: UnboundedReceiverStream::new(events_rx), result: result_rx }
    }

    fn record_rejection(&self, err: &PoolError) {
        match err {
            PoolError::UserLimit(_) => PoolCounters::incr(&self.counters.queue_rejected_user),
            PoolError::WorkspaceLimit(_) => PoolCounters::incr(&self.counters.queue_rejected_workspace),
            PoolError::GlobalLimit(_) => PoolCounters::incr(&self.counters.queue_rejected_global),
            PoolError::LoadShed { .. } => PoolCounters::incr(&self.counters.queue_rejected_shedding),
            _ => {}
        }
    }

    /// Drain as much of one workspace's queue as current worker occupancy
    /// allows: dispatch onto an idle worker, spawn a new one if there's
    /// headroom, or leave the request queued.
    async fn maybe_dispatch(self: &Arc<Self>, workspace_key: WorkspaceKey, credentials: WorkspaceCredentials) {
        loop {
            let action = {
                let mut state = self.state.lock();
                if state.admission.queue_depth(&workspace_key) == 0 {
                    break;
                }

                let idle_worker =
                    state.workers.values().find(|w| w.workspace_key == workspace_key && w.is_idle_and_ready()).map(|w| w.worker_id.clone());

                if let Some(worker_id) = idle_worker {
                    let Some(entry) = state.admission.dequeue(&workspace_key) else { break };
                    if state.admission.active_for_owner(&entry.owner_key) >= self.config.max_workers_per_user {
                        // This owner already holds its per-user concurrency cap
                        // elsewhere; park the entry back at the tail of its own
                        // queue and stop for now rather than starve it forever.
                        state.admission.enqueue(workspace_key.clone(), entry.owner_key, entry.request_id);
                        break;
                    }
                    DispatchAction::Dispatch { worker_id, request_id: entry.request_id, owner_key: entry.owner_key }
                } else {
                    let in_workspace = state.workers.values().filter(|w| w.workspace_key == workspace_key && !w.state.is_terminal()).count();
                    let total = state.workers.values().filter(|w| !w.state.is_terminal()).count();
                    if in_workspace >= self.config.effective_max_workers_per_workspace() {
                        DispatchAction::Wait
                    } else if total < self.config.max_workers {
                        DispatchAction::Spawn
                    } else if let Some(victim) = self.pick_eviction_victim(&state, &workspace_key) {
                        DispatchAction::Evict { worker_id: victim }
                    } else {
                        DispatchAction::Wait
                    }
                }
            };

            match action {
                DispatchAction::Dispatch { worker_id, request_id, owner_key } => {
                    self.dispatch_to_worker(worker_id, request_id, owner_key, workspace_key.clone());
                }
                DispatchAction::Spawn => {
                    let _ = self.spawn_worker(workspace_key.clone(), credentials.clone()).await;
                    // The new worker isn't idle yet; dispatch resumes from its
                    // `ready` handler.
                    break;
                }
                DispatchAction::Evict { worker_id } => {
                    self.evict_worker(&worker_id);
                    // The victim is `Dead` as of the call above, so the next
                    // loop iteration's `total` count has room to `Spawn`.
                }
                DispatchAction::Wait => break,
            }
        }
    }

    /// Pick an idle, ready worker belonging to some *other* workspace to
    /// sacrifice for this one, per the configured `EvictionStrategy`
    /// (spec.md §4.5). Never picks a worker already doing something.
    fn pick_eviction_victim(&self, state: &PoolState, workspace_key: &WorkspaceKey) -> Option<WorkerId> {
        let candidates = state.workers.values().filter(|w| &w.workspace_key != workspace_key && w.is_idle_and_ready());
        let victim = match self.config.eviction_strategy {
            crate::config::EvictionStrategy::Lru => candidates.min_by_key(|w| w.last_activity_at),
            crate::config::EvictionStrategy::Oldest => candidates.min_by_key(|w| w.created_at),
            crate::config::EvictionStrategy::LeastUsed => candidates.min_by_key(|w| w.queries_processed),
        };
        victim.map(|w| w.worker_id.clone())
    }

    /// Force-terminate `worker_id` to make room for another workspace's
    /// request and count it against `PoolCounters::evicted` (spec.md §4.5).
    fn evict_worker(&self, worker_id: &WorkerId) {
        tracing::info!(worker_id = %worker_id, "evicting idle worker to admit another workspace");
        self.force_kill_worker(worker_id);
        PoolCounters::incr(&self.counters.evicted);
        let _ = self.events.send(PoolEvent::WorkerCrashed { worker_id: worker_id.clone(), reason: "evicted to admit another workspace".to_string() });
    }

    fn dispatch_to_worker(self: &Arc<Self>, worker_id: WorkerId, request_id: RequestId, owner_key: OwnerKey, workspace_key: WorkspaceKey) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.admission.mark_active(&workspace_key, &owner_key);
        let payload = state.pending.get(&request_id).map(|p| p.payload.clone());
        if let Some(pending) = state.pending.get_mut(&request_id) {
            pending.location = PendingLocation::Dispatched(worker_id.clone());
        }
        if let Some(handle) = state.workers.get_mut(&worker_id) {
            handle.mark_busy(request_id, now);
            if let Some(payload) = payload {
                let _ = handle.send(ParentMessage::Query { request_id, payload });
            }
        }
        drop(state);
        let _ = self.events.send(PoolEvent::WorkerBusy { worker_id, request_id });
        let _ = self.events.send(PoolEvent::RequestAdmitted { request_id, owner_key, workspace_key });
    }

    async fn spawn_worker(self: &Arc<Self>, workspace_key: WorkspaceKey, credentials: WorkspaceCredentials) -> Result<WorkerId, PoolError> {
        std::fs::create_dir_all(&self.config.socket_dir).map_err(|e| PoolError::WorkerSpawnFailed(e.to_string()))?;
        #[allow(clippy::permissions_set_readonly_false)]
        if let Ok(metadata) = std::fs::metadata(&self.config.socket_dir) {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            let _ = std::fs::set_permissions(&self.config.socket_dir, perms);
        }

        let socket_path = socket_path_for(&self.config.socket_dir, &workspace_key);
        let listener = IpcListener::bind(&socket_path).map_err(|e| PoolError::WorkerSpawnFailed(e.to_string()))?;
        let spawned = self.spawner.spawn(&credentials, &socket_path).await?;
        let worker_id = WorkerId::new(format!("{}-{}", credentials.sanitized_key(), spawned.pid));

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let handle = WorkerHandle::new(worker_id.clone(), workspace_key.clone(), credentials, spawned.pid, socket_path, outbound_tx, &self.clock);
        {
            let mut state = self.state.lock();
            state.workers.insert(worker_id.clone(), handle);
        }
        PoolCounters::incr(&self.counters.spawned);
        let _ = self.events.send(PoolEvent::WorkerSpawned { worker_id: worker_id.clone(), workspace_key });

        let pool = Arc::clone(self);
        let wid = worker_id.clone();
        let child = spawned.child;
        tokio::spawn(async move {
            pool.drive_worker(wid, listener, outbound_rx, child).await;
        });

        Ok(worker_id)
    }

    /// Own one worker's socket for its entire lifetime: the startup
    /// handshake, the read/write/exit select loop, and final reaping.
    async fn drive_worker(
        self: Arc<Self>,
        worker_id: WorkerId,
        listener: IpcListener,
        mut outbound_rx: mpsc::UnboundedReceiver<ParentMessage>,
        mut child: tokio::process::Child,
    ) {
        let accepted = tokio::time::timeout(self.config.ready_timeout(), listener.accept::<WorkerMessage, ParentMessage>()).await;
        let stream = match accepted {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                self.fail_worker_startup(&worker_id, format!("accept failed: {err}"), &mut child).await;
                return;
            }
            Err(_) => {
                self.fail_worker_startup(&worker_id, "worker socket never connected".to_string(), &mut child).await;
                return;
            }
        };

        let (mut reader, mut writer) = stream.into_split();

        match tokio::time::timeout(self.config.ready_timeout(), reader.recv()).await {
            Ok(Ok(Some(WorkerMessage::Ready {}))) => self.mark_worker_ready(&worker_id),
            _ => {
                self.fail_worker_startup(&worker_id, "worker did not send ready in time".to_string(), &mut child).await;
                return;
            }
        }

        loop {
            tokio::select! {
                exit = child.wait() => {
                    let _ = exit;
                    self.on_worker_disconnected(&worker_id);
                    self.remove_worker(&worker_id);
                    return;
                }
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(msg) => {
                            if writer.send(&msg).await.is_err() {
                                PoolCounters::incr(&self.counters.socket_errors);
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = reader.recv() => {
                    match incoming {
                        Ok(Some(msg)) => self.on_worker_message(&worker_id, msg),
                        Ok(None) => {
                            self.on_worker_disconnected(&worker_id);
                            break;
                        }
                        Err(_) => {
                            PoolCounters::incr(&self.counters.socket_errors);
                            self.on_worker_disconnected(&worker_id);
                            break;
                        }
                    }
                }
            }
        }

        self.kill_and_reap(&mut child).await;
        self.remove_worker(&worker_id);
    }

    async fn fail_worker_startup(&self, worker_id: &WorkerId, reason: String, child: &mut tokio::process::Child) {
        let _ = self.events.send(PoolEvent::WorkerCrashed { worker_id: worker_id.clone(), reason });
        self.kill_and_reap(child).await;
        self.remove_worker(worker_id);
    }

    fn remove_worker(&self, worker_id: &WorkerId) {
        let mut state = self.state.lock();
        if let Some(handle) = state.workers.remove(worker_id) {
            let _ = std::fs::remove_file(&handle.socket_path);
        }
    }

    fn mark_worker_ready(self: &Arc<Self>, worker_id: &WorkerId) {
        let context = {
            let mut state = self.state.lock();
            let Some(handle) = state.workers.get_mut(worker_id) else { return };
            handle.mark_ready();
            Some((handle.workspace_key.clone(), handle.credentials.clone()))
        };
        let _ = self.events.send(PoolEvent::WorkerReady { worker_id: worker_id.clone() });
        if let Some((workspace_key, credentials)) = context {
            let pool = Arc::clone(self);
            tokio::spawn(async move { pool.maybe_dispatch(workspace_key, credentials).await });
        }
    }

    fn on_worker_message(self: &Arc<Self>, worker_id: &WorkerId, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Session { request_id, session_id } => self.forward_event(request_id, StreamEvent::Session { session_id }),
            WorkerMessage::Message { request_id, content } => self.forward_event(request_id, StreamEvent::Message { content }),
            WorkerMessage::Complete { request_id, result } => self.complete_request(
                worker_id,
                request_id,
                CompleteOutcome::Success { total_messages: result.total_messages, result: result.result, cancelled: result.cancelled },
            ),
            WorkerMessage::Error { request_id, error, stack, stderr } => self.complete_request(
                worker_id,
                request_id,
                CompleteOutcome::Failure(PoolError::AgentRuntimeError { message: error, stack, stderr_tail: stderr }),
            ),
            WorkerMessage::ShutdownAck {} => self.begin_worker_termination(worker_id, "shutdown acknowledged".to_string()),
            // A second `ready` past startup would be a protocol violation from
            // a well-behaved worker; ignore rather than tear the connection down.
            WorkerMessage::Ready {} => {}
            WorkerMessage::HealthOk { .. } => {}
        }
    }

    fn forward_event(&self, request_id: RequestId, event: StreamEvent) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.get_mut(&request_id) {
            if matches!(event, StreamEvent::Message { .. }) {
                pending.message_count += 1;
            }
            let _ = pending.events_tx.send(event);
        }
    }

    fn complete_request(self: &Arc<Self>, worker_id: &WorkerId, request_id: RequestId, outcome: CompleteOutcome) {
        let now = self.clock.now();
        let mut emitted_event = None;
        let should_retire;
        let workspace_key;

        {
            let mut state = self.state.lock();
            let Some((ws, owner)) = state.pending.get(&request_id).map(|p| (p.workspace_key.clone(), p.owner_key.clone())) else {
                return;
            };
            state.admission.mark_inactive(&ws, &owner);
            should_retire = state
                .workers
                .get_mut(worker_id)
                .filter(|h| h.state != WorkerState::Dead)
                .map(|h| h.complete_request(now))
                .unwrap_or(false);
            workspace_key = ws;

            if let Some(mut pending) = state.pending.remove(&request_id) {
                if let Some(result_tx) = pending.result_tx.take() {
                    match outcome {
                        CompleteOutcome::Success { total_messages, result, cancelled } => {
                            let total_messages = total_messages.max(pending.message_count);
                            emitted_event = Some(PoolEvent::RequestCompleted { request_id, total_messages, cancelled });
                            let _ = result_tx.send(Ok(QueryOutcome { total_messages, result, cancelled }));
                        }
                        CompleteOutcome::Failure(err) => {
                            emitted_event = Some(PoolEvent::RequestFailed { request_id, error: (&err).into() });
                            let _ = result_tx.send(Err(err));
                        }
                    }
                }
            }
        }

        if let Some(event) = emitted_event {
            let _ = self.events.send(event);
        }

        if should_retire {
            PoolCounters::incr(&self.counters.retired_after_cancel);
            self.begin_worker_termination(worker_id, "retiring after cancel".to_string());
        } else {
            let credentials = {
                let state = self.state.lock();
                state.workers.get(worker_id).map(|h| h.credentials.clone())
            };
            if let Some(credentials) = credentials {
                let pool = Arc::clone(self);
                tokio::spawn(async move { pool.maybe_dispatch(workspace_key, credentials).await });
            }
        }
    }

    fn on_worker_disconnected(self: &Arc<Self>, worker_id: &WorkerId) {
        let active_request = {
            let mut state = self.state.lock();
            let Some(handle) = state.workers.get_mut(worker_id) else { return };
            let active = handle.active_request_id;
            handle.mark_dead();
            active
        };

        if let Some(request_id) = active_request {
            self.complete_request(
                worker_id,
                request_id,
                CompleteOutcome::Failure(PoolError::WorkerCrashed(format!("worker {worker_id} disconnected unexpectedly"))),
            );
        }

        let _ = self.events.send(PoolEvent::WorkerCrashed { worker_id: worker_id.clone(), reason: "socket closed unexpectedly".to_string() });
    }

    fn begin_worker_termination(&self, worker_id: &WorkerId, reason: String) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(handle) = state.workers.get_mut(worker_id) else { return };
        handle.begin_shutdown(now);
        let _ = handle.send(ParentMessage::Shutdown { graceful: true });
        tracing::info!(worker_id = %worker_id, reason = %reason, "shutting down worker");
    }

    async fn kill_and_reap(&self, child: &mut tokio::process::Child) {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        if let Some(pid) = child.id() {
            let pgid = nix::unistd::Pid::from_raw(pid as i32);
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGTERM);
        }
        if tokio::time::timeout(self.config.kill_grace(), child.wait()).await.is_err() {
            if let Some(pid) = child.id() {
                let pgid = nix::unistd::Pid::from_raw(pid as i32);
                let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
            }
            PoolCounters::incr(&self.counters.group_kill_escalations);
            let _ = child.wait().await;
        }
        PoolCounters::incr(&self.counters.group_terminations);
    }

    fn spawn_cancel_watcher(self: &Arc<Self>, request_id: RequestId, cancel: CancellationToken) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            cancel.cancelled().await;
            pool.handle_cancel(request_id).await;
        });
    }

    async fn handle_cancel(self: &Arc<Self>, request_id: RequestId) {
        let action = {
            let mut state = self.state.lock();
            let Some(pending) = state.pending.get(&request_id) else { return };
            match &pending.location {
                PendingLocation::Queued => {
                    let workspace_key = pending.workspace_key.clone();
                    let owner_key = pending.owner_key.clone();
                    state.admission.remove_queued(&workspace_key, &owner_key, request_id);
                    CancelAction::ResolveQueued
                }
                PendingLocation::Dispatched(worker_id) => {
                    let worker_id = worker_id.clone();
                    if let Some(handle) = state.workers.get_mut(&worker_id) {
                        handle.begin_cancel(self.clock.now() + self.config.cancel_timeout());
                        let _ = handle.send(ParentMessage::Cancel { request_id });
                        CancelAction::WatchWorker(worker_id)
                    } else {
                        CancelAction::None
                    }
                }
            }
        };

        match action {
            CancelAction::ResolveQueued => {
                let mut state = self.state.lock();
                if let Some(mut pending) = state.pending.remove(&request_id) {
                    if let Some(result_tx) = pending.result_tx.take() {
                        let _ = result_tx.send(Ok(QueryOutcome { total_messages: 0, result: None, cancelled: true }));
                    }
                }
            }
            CancelAction::WatchWorker(worker_id) => {
                let pool = Arc::clone(self);
                let timeout = self.config.cancel_timeout();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    pool.force_kill_if_still_cancelling(&worker_id, request_id).await;
                });
            }
            CancelAction::None => {}
        }
    }

    async fn force_kill_if_still_cancelling(self: &Arc<Self>, worker_id: &WorkerId, request_id: RequestId) {
        let still_stuck = {
            let state = self.state.lock();
            state.workers.get(worker_id).map(|h| h.active_request_id == Some(request_id)).unwrap_or(false)
        };
        if !still_stuck {
            return;
        }
        self.complete_request(
            worker_id,
            request_id,
            CompleteOutcome::Failure(PoolError::WorkerKilled(format!("worker {worker_id} did not honor cancel within the configured timeout"))),
        );
        self.force_kill_worker(worker_id);
    }

    /// Send `SIGKILL` to a worker's process group directly, bypassing the
    /// graceful shutdown handshake. Used by the cancel-timeout watchdog and
    /// by the reaper for workers stuck past their shutdown deadline.
    pub(crate) fn force_kill_worker(&self, worker_id: &WorkerId) {
        let pid = {
            let mut state = self.state.lock();
            let pid = state.workers.get(worker_id).map(|h| h.pid);
            if let Some(handle) = state.workers.get_mut(worker_id) {
                handle.mark_dead();
            }
            pid
        };
        if let Some(pid) = pid {
            let pgid = nix::unistd::Pid::from_raw(pid as i32);
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
            PoolCounters::incr(&self.counters.group_kill_escalations);
        }
    }

    pub async fn shutdown_all(self: &Arc<Self>) {
        let worker_ids: Vec<WorkerId> = {
            let mut state = self.state.lock();
            state.shutting_down = true;
            state.workers.keys().cloned().collect()
        };
        for worker_id in &worker_ids {
            self.begin_worker_termination(worker_id, "pool shutdown".to_string());
        }

        let deadline = self.clock.now() + self.config.shutdown_timeout();
        while self.clock.now() < deadline {
            if self.state.lock().workers.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let stragglers: Vec<WorkerId> = self.state.lock().workers.keys().cloned().collect();
        for worker_id in stragglers {
            self.force_kill_worker(&worker_id);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let mut workers_ready = 0u32;
        let mut workers_busy = 0u32;
        for handle in state.workers.values() {
            match handle.state {
                WorkerState::Ready => workers_ready += 1,
                WorkerState::Busy => workers_busy += 1,
                _ => {}
            }
        }
        PoolStats {
            workers_total: state.workers.len() as u32,
            workers_ready,
            workers_busy,
            queued_requests: state.admission.global_queued() as u32,
            active_requests: state.pending.values().filter(|p| matches!(p.location, PendingLocation::Dispatched(_))).count() as u32,
            counters: self.counters.snapshot(),
        }
    }

    pub fn debug_snapshot(&self) -> Vec<WorkerInfo> {
        let state = self.state.lock();
        state
            .workers
            .values()
            .map(|h| WorkerInfo {
                worker_id: h.worker_id.clone(),
                workspace_key: h.workspace_key.clone(),
                pid: h.pid,
                state: format!("{:?}", h.state),
                queries_processed: h.queries_processed,
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn worker_state_for_test(&self, worker_id: &WorkerId) -> Option<WorkerState> {
        self.state.lock().workers.get(worker_id).map(|h| h.state)
    }

    pub(crate) fn clock_now(&self) -> std::time::Instant {
        self.clock.now()
    }

    /// Idle-and-ready workers whose age or inactivity has crossed a
    /// configured deadline, paired with which deadline it was.
    pub(crate) fn workers_past_deadline(&self, now: std::time::Instant) -> Vec<(WorkerId, crate::reaper::RecycleReason)> {
        let state = self.state.lock();
        state
            .workers
            .values()
            .filter(|h| h.is_idle_and_ready())
            .filter_map(|h| crate::reaper::deadline_reason(h.state, h.created_at, h.last_activity_at, now, &self.config).map(|r| (h.worker_id.clone(), r)))
            .collect()
    }

    /// Workers still in `ShuttingDown` past `shutdown_timeout` since the
    /// shutdown was requested — candidates for a forceful kill.
    pub(crate) fn workers_stuck_shutting_down(&self, now: std::time::Instant) -> Vec<WorkerId> {
        let state = self.state.lock();
        state
            .workers
            .values()
            .filter(|h| h.state == WorkerState::ShuttingDown)
            .filter(|h| h.shutdown_initiated_at.map(|t| now.duration_since(t) >= self.config.shutdown_timeout()).unwrap_or(false))
            .map(|h| h.worker_id.clone())
            .collect()
    }

    pub(crate) fn live_socket_paths(&self) -> std::collections::HashSet<std::path::PathBuf> {
        self.state.lock().workers.values().map(|h| h.socket_path.clone()).collect()
    }

    /// Begin a graceful recycle of an idle worker (no in-flight request to
    /// wait for, unlike cancel-triggered retirement).
    pub(crate) fn begin_recycle(&self, worker_id: &WorkerId) {
        PoolCounters::incr(&self.counters.evicted);
        self.begin_worker_termination(worker_id, "recycled".to_string());
    }
}

enum CompleteOutcome {
    Success { total_messages: u64, result: Option<serde_json::Value>, cancelled: bool },
    Failure(PoolError),
}

static GLOBAL: OnceLock<Arc<Pool<ProcessSpawner, SystemClock>>> = OnceLock::new();

/// The process-wide pool, lazily constructed from [`PoolConfig::default`] on
/// first use.
pub fn global() -> &'static Arc<Pool<ProcessSpawner, SystemClock>> {
    GLOBAL.get_or_init(|| {
        let config = PoolConfig::default();
        let spawner = ProcessSpawner {
            worker_entry_path: config.worker_entry_path.clone(),
            sessions_base_dir: config.sessions_base_dir.clone(),
        };
        Pool::new(config, spawner, SystemClock)
    })
}

/// Initialize the process-wide pool with an explicit configuration. Only the
/// first call (across `global`/`init_global`) takes effect.
pub fn init_global(config: PoolConfig) -> &'static Arc<Pool<ProcessSpawner, SystemClock>> {
    GLOBAL.get_or_init(|| {
        let spawner = ProcessSpawner {
            worker_entry_path: config.worker_entry_path.clone(),
            sessions_base_dir: config.sessions_base_dir.clone(),
        };
        Pool::new(config, spawner, SystemClock)
    })
}
