// SPDX-License-Identifier: MIT

use super::*;
use pool_adapters::ScriptedRuntime;
use pool_core::AgentConfig;
use serial_test::serial;
use std::collections::BTreeMap;
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
        oauth_tokens: BTreeMap::new(),
        user_env_keys: BTreeMap::new(),
    }
}

#[tokio::test]
async fn happy_path_streams_session_then_message_then_complete() {
    let runtime = ScriptedRuntime::happy_path("session-1", serde_json::json!({"status": "ok"}));
    let (messages, _) =
        run_query(&runtime, RequestId::new(), request("hello"), false, &HashSet::new(), CancellationToken::new()).await;

    assert!(matches!(messages[0], WorkerMessage::Session { .. }));
    assert!(matches!(messages[1], WorkerMessage::Message { .. }));
    match messages.last().expect("complete message") {
        WorkerMessage::Complete { result, .. } => {
            assert_eq!(result.total_messages, 2);
            assert_eq!(result.result, Some(serde_json::json!({"status": "ok"})));
            assert!(!result.cancelled);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[tokio::test]
async fn runtime_error_after_terminal_result_is_still_reported_as_success() {
    use pool_adapters::fake::ScriptStep;
    let runtime = ScriptedRuntime::new(vec![
        ScriptStep::Init("session-2".to_string()),
        ScriptStep::TerminalResult(serde_json::json!({"status": "done"})),
        ScriptStep::Fail("sdk teardown noise".to_string()),
    ]);

    let (messages, _) =
        run_query(&runtime, RequestId::new(), request("hello"), false, &HashSet::new(), CancellationToken::new()).await;

    match messages.last().expect("final message") {
        WorkerMessage::Complete { result, .. } => {
            assert_eq!(result.result, Some(serde_json::json!({"status": "done"})));
            assert!(!result.cancelled);
        }
        other => panic!("expected Complete despite the trailing runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn a_runtime_error_with_no_prior_terminal_result_is_reported_as_an_error() {
    use pool_adapters::fake::ScriptStep;
    let runtime = ScriptedRuntime::new(vec![ScriptStep::Init("session-3".to_string()), ScriptStep::Fail("boom".to_string())]);

    let (messages, _) =
        run_query(&runtime, RequestId::new(), request("hello"), false, &HashSet::new(), CancellationToken::new()).await;

    match messages.last().expect("final message") {
        WorkerMessage::Error { error, .. } => assert_eq!(error, "boom"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn an_empty_message_is_rejected_without_calling_the_runtime() {
    let runtime = ScriptedRuntime::happy_path("session-4", serde_json::json!({}));
    let (messages, _) =
        run_query(&runtime, RequestId::new(), request("   "), false, &HashSet::new(), CancellationToken::new()).await;

    assert_eq!(messages.len(), 1);
    assert!(matches!(&messages[0], WorkerMessage::Error { error, .. } if error == "invalid payload"));
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn a_cancelled_token_is_reflected_in_the_complete_result() {
    use pool_adapters::fake::ScriptStep;
    let runtime = ScriptedRuntime::new(vec![
        ScriptStep::Init("session-5".to_string()),
        ScriptStep::Delay(std::time::Duration::from_secs(60)),
        ScriptStep::TerminalResult(serde_json::json!({"status": "should never arrive"})),
    ]);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let run = tokio::spawn(async move {
        run_query(&runtime, RequestId::new(), request("hello"), false, &HashSet::new(), cancel_clone).await
    });

    // Give run_query a chance to reach the delay step before cancelling it.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cancel.cancel();
    let (messages, _) = run.await.expect("run_query task");

    match messages.last().expect("final message") {
        WorkerMessage::Complete { result, .. } => {
            assert!(result.cancelled);
            assert_eq!(result.result, None);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[test]
#[serial]
fn environment_is_reset_between_queries() {
    let mut first = request("first");
    first.user_env_keys.insert("USER_NAME".to_string(), "alice".to_string());
    first.session_cookie = Some("cookie-1".to_string());

    let applied = apply_query_environment(&first, &HashSet::new());
    assert_eq!(std::env::var("USER_NAME").as_deref(), Ok("alice"));
    assert_eq!(std::env::var("ALIVE_SESSION_COOKIE").as_deref(), Ok("cookie-1"));

    let mut second = request("second");
    second.user_env_keys.insert("USER_EMAIL".to_string(), "bob@example.com".to_string());

    let applied = apply_query_environment(&second, &applied);
    assert!(std::env::var("USER_NAME").is_err(), "previous tenant's key must not leak into the next query");
    assert!(std::env::var("ALIVE_SESSION_COOKIE").is_err());
    assert_eq!(std::env::var("USER_EMAIL").as_deref(), Ok("bob@example.com"));

    for key in &applied {
        std::env::remove_var(key);
    }
    std::env::remove_var("ALIVE_SESSION_COOKIE");
}
