// SPDX-License-Identifier: MIT

use super::*;
use crate::policy::build_permission_callback;
use futures_util::StreamExt;
use pool_core::AgentConfig;
use tokio_util::sync::CancellationToken;

fn request(message: &str) -> AgentRequest {
    AgentRequest {
        message: message.to_string(),
        agent_config: AgentConfig::default(),
        model: None,
        system_prompt: None,
        resume: None,
        resume_session_at: None,
        max_turns: None,
        api_key: None,
        session_cookie: None,
        oauth_tokens: Default::default(),
        user_env_keys: Default::default(),
    }
}

#[tokio::test]
async fn happy_path_yields_init_message_then_terminal_result() {
    let runtime = ScriptedRuntime::happy_path("sess-1", serde_json::json!({"ok": true}));
    let permission = build_permission_callback(AgentConfig::default(), false);
    let mut stream = runtime.query(&request("hi"), permission, CancellationToken::new()).await.expect("query");

    let first = stream.next().await.expect("item").expect("ok");
    assert!(matches!(first, RuntimeEvent::Init { session_id } if session_id == "sess-1"));

    let second = stream.next().await.expect("item").expect("ok");
    assert!(matches!(second, RuntimeEvent::Message(_)));

    let third = stream.next().await.expect("item").expect("ok");
    assert!(matches!(third, RuntimeEvent::TerminalResult(_)));

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn fail_after_terminal_result_is_observable_as_an_error_item() {
    let runtime = ScriptedRuntime::new(vec![
        ScriptStep::Init("sess-2".to_string()),
        ScriptStep::TerminalResult(serde_json::json!({"ok": true})),
        ScriptStep::Fail("process exited 1".to_string()),
    ]);
    let permission = build_permission_callback(AgentConfig::default(), false);
    let mut stream = runtime.query(&request("hi"), permission, CancellationToken::new()).await.expect("query");

    let _ = stream.next().await.expect("init");
    let terminal = stream.next().await.expect("terminal").expect("ok");
    assert!(matches!(terminal, RuntimeEvent::TerminalResult(_)));

    let failure = stream.next().await.expect("failure");
    assert!(failure.is_err());
}

#[tokio::test]
async fn delay_steps_are_skipped_without_producing_items() {
    let runtime = ScriptedRuntime::new(vec![
        ScriptStep::Delay(std::time::Duration::from_millis(1)),
        ScriptStep::Init("sess-3".to_string()),
    ]);
    let permission = build_permission_callback(AgentConfig::default(), false);
    let mut stream = runtime.query(&request("hi"), permission, CancellationToken::new()).await.expect("query");
    let first = stream.next().await.expect("item").expect("ok");
    assert!(matches!(first, RuntimeEvent::Init { .. }));
}

#[tokio::test]
async fn a_cancelled_token_stops_the_stream_before_further_items() {
    let runtime = ScriptedRuntime::new(vec![
        ScriptStep::Init("sess-5".to_string()),
        ScriptStep::Delay(std::time::Duration::from_secs(60)),
        ScriptStep::TerminalResult(serde_json::json!({"status": "should never arrive"})),
    ]);
    let permission = build_permission_callback(AgentConfig::default(), false);
    let cancel = CancellationToken::new();
    let mut stream = runtime.query(&request("hi"), permission, cancel.clone()).await.expect("query");

    let first = stream.next().await.expect("item").expect("ok");
    assert!(matches!(first, RuntimeEvent::Init { .. }));

    cancel.cancel();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn an_already_cancelled_token_yields_nothing() {
    let runtime = ScriptedRuntime::happy_path("sess-6", serde_json::json!({"ok": true}));
    let permission = build_permission_callback(AgentConfig::default(), false);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut stream = runtime.query(&request("hi"), permission, cancel).await.expect("query");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn records_every_call_with_the_probed_permission_decision() {
    let runtime = ScriptedRuntime::happy_path("sess-4", serde_json::json!(null))
        .probing_tool("Bash", Some("ls".to_string()));
    let permission = build_permission_callback(AgentConfig::default(), false);
    let _ = runtime.query(&request("run it"), permission, CancellationToken::new()).await.expect("query");

    let calls = runtime.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].message, "run it");
    assert_eq!(calls[0].permission_probe.as_ref().unwrap().0, "Bash");
}
