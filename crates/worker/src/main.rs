// SPDX-License-Identifier: MIT

//! `poolworkerd`: one OS process serving exactly one tenant workspace for
//! its lifetime (spec.md §4.3). Connects back to the parent over the Unix
//! socket named in its spawn contract, drops privileges to the target
//! identity, and then serves `query`/`cancel`/`shutdown`/`health_check`
//! requests one at a time until the parent closes the connection or asks it
//! to shut down.

use pool_wire::{connect, ParentMessage, WorkerMessage};
use pool_worker::{privilege, query, session, startup::SpawnContract};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let contract = match SpawnContract::from_env() {
        Ok(contract) => contract,
        Err(err) => {
            tracing::error!(error = %err, "failed to parse spawn contract");
            std::process::exit(1);
        }
    };

    tracing::info!(workspace_key = %contract.workspace_key, uid = contract.uid, gid = contract.gid, "worker starting");

    // The parent's socket directory is root-only, so the connection must be
    // made while still running as root. Privileges are dropped only after
    // that handshake, and the chdir into the session home happens last of
    // all so a failure to reach it never leaves the worker running as root
    // with an open parent connection it can't use.
    let mut stream = match connect::<ParentMessage, WorkerMessage>(&contract.socket_path).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to parent socket");
            std::process::exit(1);
        }
    };

    let session_home =
        session::resolve_session_home(&contract.sessions_base_dir, &contract.workspace_key, contract.uid, contract.gid);

    if let Err(err) = privilege::drop_privileges(contract.uid, contract.gid) {
        tracing::error!(error = %err, "failed to drop privileges, refusing to serve this workspace");
        std::process::exit(1);
    }

    if let Err(err) = std::env::set_current_dir(&session_home) {
        tracing::error!(error = %err, path = %session_home.display(), "failed to chdir into session home");
        std::process::exit(1);
    }

    if let Err(err) = stream.send(&WorkerMessage::Ready {}).await {
        tracing::error!(error = %err, "failed to send ready handshake");
        std::process::exit(1);
    }

    // The real agent SDK is an opaque dependency the host process supplies
    // at runtime (spec.md §3); it lives outside this workspace's crates, so
    // this binary wires against the scripted fake at the same integration
    // point a real SDK-backed implementation would occupy.
    let runtime = pool_adapters::ScriptedRuntime::happy_path("worker-session", serde_json::json!({"status": "ok"}));

    let is_superuser = contract.is_superuser_passthrough();
    let mut busy_with: Option<pool_core::RequestId> = None;
    let mut env_keys = HashSet::new();

    loop {
        let msg = match stream.recv().await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                tracing::info!("parent closed the connection, exiting");
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "fatal protocol error, exiting");
                return;
            }
        };

        match msg {
            ParentMessage::Query { request_id, payload } => {
                if let Some(active) = busy_with {
                    let _ = stream
                        .send(&WorkerMessage::Error {
                            request_id,
                            error: format!("worker is already busy with request {active}"),
                            stack: None,
                            stderr: Vec::new(),
                        })
                        .await;
                    continue;
                }

                busy_with = Some(request_id);
                let cancel = CancellationToken::new();

                // Race the query to completion against further parent
                // traffic, so a `Cancel` for this request is observed and
                // acted on while the query is still in flight instead of
                // only after it finishes on its own (spec.md §4.3).
                let (messages, now_set) = {
                    let query_fut = query::run_query(&runtime, request_id, payload, is_superuser, &env_keys, cancel.clone());
                    tokio::pin!(query_fut);

                    loop {
                        tokio::select! {
                            biased;
                            result = &mut query_fut => break result,
                            msg = stream.recv() => match msg {
                                Ok(Some(ParentMessage::Cancel { request_id: cancel_id })) if cancel_id == request_id => {
                                    cancel.cancel();
                                }
                                Ok(Some(ParentMessage::Cancel { request_id: other_id })) => {
                                    tracing::debug!(request_id = %other_id, "cancel received for a request that is not in flight");
                                }
                                Ok(Some(ParentMessage::HealthCheck {})) => {
                                    let _ = stream.send(&WorkerMessage::HealthOk { uptime_ms: 0, queries_processed: 0 }).await;
                                }
                                Ok(Some(ParentMessage::Query { request_id: other_id, .. })) => {
                                    let _ = stream
                                        .send(&WorkerMessage::Error {
                                            request_id: other_id,
                                            error: format!("worker is already busy with request {request_id}"),
                                            stack: None,
                                            stderr: Vec::new(),
                                        })
                                        .await;
                                }
                                Ok(Some(ParentMessage::Shutdown { .. })) => {
                                    // Finish the in-flight query before honoring
                                    // shutdown; cancel it so it winds down fast.
                                    cancel.cancel();
                                }
                                Ok(None) => {
                                    tracing::info!("parent closed the connection mid-query, exiting");
                                    return;
                                }
                                Err(err) => {
                                    tracing::error!(error = %err, "fatal protocol error mid-query, exiting");
                                    return;
                                }
                            },
                        }
                    }
                };

                env_keys = now_set;
                for message in &messages {
                    if stream.send(message).await.is_err() {
                        tracing::error!("parent socket write failed mid-query, exiting");
                        return;
                    }
                }
                busy_with = None;
            }
            ParentMessage::Cancel { request_id } => {
                tracing::debug!(%request_id, "cancel received with no matching in-flight query");
            }
            ParentMessage::Shutdown { graceful } => {
                tracing::info!(graceful, "shutdown requested");
                if graceful {
                    let _ = stream.send(&WorkerMessage::ShutdownAck {}).await;
                }
                return;
            }
            ParentMessage::HealthCheck {} => {
                let _ = stream.send(&WorkerMessage::HealthOk { uptime_ms: 0, queries_processed: 0 }).await;
            }
        }
    }
}
