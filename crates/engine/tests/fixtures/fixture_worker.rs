// SPDX-License-Identifier: MIT

//! A cooperative stand-in for `poolworkerd` used only by pool-engine's own
//! integration tests. Speaks just enough of the parent<->worker protocol
//! (spec.md §4.2/§4.3) to drive the pool through real processes and real
//! Unix sockets, without an agent runtime or privilege drop.
//!
//! Behavior is controlled by environment variables the test harness sets
//! alongside the spawn contract:
//! - `FIXTURE_STUBBORN=1` — ignore `shutdown`/`cancel` entirely, for
//!   exercising the reaper's kill escalation (spec.md S5).
//! - `FIXTURE_ECHO_MESSAGE=1` — stream the request message back as a single
//!   `message` event before completing, so tests can assert on payload
//!   round-tripping.
//!
//! A request message of the form `sleep:<ms>:<rest>` holds the query open
//! for `<ms>` milliseconds (still able to observe `cancel` during that
//! window) before completing, so tests can exercise mid-flight cancellation
//! (spec.md S4) and fairness ordering (spec.md S3) without a real agent
//! runtime.

use pool_core::RequestId;
use pool_wire::{connect, CompleteResult, ParentMessage, WorkerMessage};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let socket_path = PathBuf::from(std::env::var("WORKER_SOCKET_PATH").expect("WORKER_SOCKET_PATH not set"));
    let stubborn = std::env::var("FIXTURE_STUBBORN").as_deref() == Ok("1");
    let echo = std::env::var("FIXTURE_ECHO_MESSAGE").as_deref() == Ok("1");

    let mut stream = connect::<ParentMessage, WorkerMessage>(&socket_path).await.expect("connect to parent socket");
    stream.send(&WorkerMessage::Ready {}).await.expect("send ready");

    let mut busy_with: Option<RequestId> = None;

    loop {
        let Some(msg) = stream.recv().await.expect("recv from parent") else {
            return;
        };
        match msg {
            ParentMessage::Query { request_id, payload } => {
                busy_with = Some(request_id);
                let session_id = format!("fixture-session-{request_id}");
                stream.send(&WorkerMessage::Session { request_id, session_id }).await.expect("send session");

                let sleep_ms = parse_sleep_ms(&payload.message);
                let mut cancelled = false;
                if sleep_ms > 0 {
                    let sleep = tokio::time::sleep(Duration::from_millis(sleep_ms));
                    tokio::pin!(sleep);
                    loop {
                        tokio::select! {
                            () = &mut sleep => break,
                            next = stream.recv() => {
                                match next.expect("recv from parent") {
                                    Some(ParentMessage::Cancel { request_id: rid }) if busy_with == Some(rid) => {
                                        if stubborn {
                                            continue;
                                        }
                                        cancelled = true;
                                        break;
                                    }
                                    Some(ParentMessage::Shutdown { .. }) if stubborn => continue,
                                    Some(ParentMessage::Shutdown { .. }) => {
                                        stream.send(&WorkerMessage::ShutdownAck {}).await.expect("send shutdown ack");
                                        return;
                                    }
                                    None => return,
                                    _ => continue,
                                }
                            }
                        }
                    }
                }

                if cancelled {
                    stream
                        .send(&WorkerMessage::Complete { request_id, result: CompleteResult { total_messages: 0, result: None, cancelled: true } })
                        .await
                        .expect("send cancelled complete");
                } else {
                    if echo {
                        stream
                            .send(&WorkerMessage::Message { request_id, content: serde_json::json!({ "echo": payload.message }) })
                            .await
                            .expect("send message");
                    }
                    stream
                        .send(&WorkerMessage::Complete {
                            request_id,
                            result: CompleteResult { total_messages: if echo { 1 } else { 0 }, result: Some(serde_json::json!({"ok": true})), cancelled: false },
                        })
                        .await
                        .expect("send complete");
                }
                busy_with = None;
            }
            ParentMessage::Cancel { request_id } => {
                if stubborn {
                    continue;
                }
                if busy_with == Some(request_id) {
                    stream
                        .send(&WorkerMessage::Complete {
                            request_id,
                            result: CompleteResult { total_messages: 0, result: None, cancelled: true },
                        })
                        .await
                        .expect("send cancelled complete");
                    busy_with = None;
                }
            }
            ParentMessage::Shutdown { .. } => {
                if stubborn {
                    continue;
                }
                stream.send(&WorkerMessage::ShutdownAck {}).await.expect("send shutdown ack");
                return;
            }
            ParentMessage::HealthCheck {} => {
                stream.send(&WorkerMessage::HealthOk { uptime_ms: 0, queries_processed: 0 }).await.expect("send health ok");
            }
        }
    }
}

/// Parse a `sleep:<ms>:<rest>` prefix out of a request message; returns 0
/// when the message carries no such prefix.
fn parse_sleep_ms(message: &str) -> u64 {
    let Some(rest) = message.strip_prefix("sleep:") else { return 0 };
    let Some((ms, _)) = rest.split_once(':') else { return 0 };
    ms.parse().unwrap_or(0)
}
