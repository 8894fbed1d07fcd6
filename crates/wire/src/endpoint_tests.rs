// SPDX-License-Identifier: MIT

use super::*;
use crate::messages::{ParentMessage, WorkerMessage};
use pool_core::RequestId;
use tokio::io::AsyncWriteExt as _;

fn socket_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(name)
}

#[tokio::test]
async fn parent_and_worker_exchange_messages_over_the_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = socket_path(&dir, "w.sock");

    let listener = IpcListener::bind(&path).expect("bind");
    let accept_path = path.clone();
    let accept_task = tokio::spawn(async move {
        let listener = listener;
        let mut parent_side: MessageStream<WorkerMessage, ParentMessage> =
            listener.accept().await.expect("accept");
        // Parent receives `ready`, then sends a query and awaits `complete`.
        let ready = parent_side.recv().await.expect("recv").expect("some");
        assert!(matches!(ready, WorkerMessage::Ready {}));

        let request_id = RequestId::new();
        let payload = pool_core::AgentRequest {
            message: "hello".to_string(),
            agent_config: Default::default(),
            model: None,
            system_prompt: None,
            resume: None,
            resume_session_at: None,
            max_turns: None,
            api_key: None,
            session_cookie: None,
            oauth_tokens: Default::default(),
            user_env_keys: Default::default(),
        };
        parent_side.send(&ParentMessage::Query { request_id, payload }).await.expect("send");

        let complete = parent_side.recv().await.expect("recv").expect("some");
        match complete {
            WorkerMessage::Complete { request_id: rid, result } => {
                assert_eq!(rid, request_id);
                assert_eq!(result.total_messages, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let _ = accept_path;
    });

    // Give the listener a moment to be bound before the worker connects.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let mut worker_side: MessageStream<ParentMessage, WorkerMessage> =
        connect(&path).await.expect("connect");
    worker_side.send(&WorkerMessage::Ready {}).await.expect("send ready");

    let query = worker_side.recv().await.expect("recv").expect("some");
    let request_id = match query {
        ParentMessage::Query { request_id, .. } => request_id,
        other => panic!("unexpected: {other:?}"),
    };
    worker_side
        .send(&WorkerMessage::Complete {
            request_id,
            result: crate::messages::CompleteResult { total_messages: 1, result: None, cancelled: false },
        })
        .await
        .expect("send complete");

    accept_task.await.expect("accept task");
}

#[tokio::test]
async fn malformed_line_is_dropped_and_stream_keeps_working() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = socket_path(&dir, "w.sock");
    let listener = IpcListener::bind(&path).expect("bind");

    let server = tokio::spawn(async move {
        let mut stream: MessageStream<ParentMessage, WorkerMessage> =
            listener.accept().await.expect("accept");
        let msg = stream.recv().await.expect("recv").expect("some");
        assert!(matches!(msg, ParentMessage::HealthCheck {}));
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let mut raw = UnixStream::connect(&path).await.expect("connect");
    raw.write_all(b"not json at all\n").await.expect("write garbage");
    raw.write_all(b"{\"type\":\"health_check\"}\n").await.expect("write real message");

    server.await.expect("server task");
}

#[tokio::test]
async fn split_halves_can_send_and_receive_independently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = socket_path(&dir, "w.sock");
    let listener = IpcListener::bind(&path).expect("bind");

    let server = tokio::spawn(async move {
        let stream: MessageStream<ParentMessage, WorkerMessage> =
            listener.accept().await.expect("accept");
        let (mut reader, mut writer) = stream.into_split();
        let msg = reader.recv().await.expect("recv").expect("some");
        assert!(matches!(msg, ParentMessage::HealthCheck {}));
        writer.send(&WorkerMessage::HealthOk { uptime_ms: 1, queries_processed: 0 }).await.expect("send");
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let mut client: MessageStream<WorkerMessage, ParentMessage> = connect(&path).await.expect("connect");
    client.send(&ParentMessage::HealthCheck {}).await.expect("send");
    let reply = client.recv().await.expect("recv").expect("some");
    assert!(matches!(reply, WorkerMessage::HealthOk { .. }));

    server.await.expect("server task");
}

#[tokio::test]
async fn connect_fails_when_nothing_is_listening() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = socket_path(&dir, "absent.sock");
    let result: Result<MessageStream<WorkerMessage, ParentMessage>, IpcError> =
        connect(&path).await;
    assert!(result.is_err());
}
