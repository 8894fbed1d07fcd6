// SPDX-License-Identifier: MIT

use super::*;
use pool_core::AgentRequest;

fn payload() -> AgentRequest {
    AgentRequest {
        message: "hi".to_string(),
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
    }
}

#[test]
fn query_round_trips_through_json() {
    let request_id = RequestId::new();
    let msg = ParentMessage::Query { request_id, payload: payload() };
    let json = serde_json::to_string(&msg).expect("encode");
    let decoded: ParentMessage = serde_json::from_str(&json).expect("decode");
    match decoded {
        ParentMessage::Query { request_id: rid, payload: p } => {
            assert_eq!(rid, request_id);
            assert_eq!(p.message, "hi");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn cancel_tag_is_the_type_field() {
    let json = serde_json::to_value(ParentMessage::Cancel { request_id: RequestId::new() })
        .expect("encode");
    assert_eq!(json["type"], "cancel");
}

#[test]
fn unknown_type_tag_fails_to_decode() {
    let json = r#"{"type":"not_a_real_message"}"#;
    assert!(serde_json::from_str::<ParentMessage>(json).is_err());
}

#[test]
fn unknown_extra_fields_are_ignored() {
    let json = r#"{"type":"health_check","unexpected_field":123}"#;
    let decoded: ParentMessage = serde_json::from_str(json).expect("decode");
    assert!(matches!(decoded, ParentMessage::HealthCheck {}));
}

#[test]
fn error_message_omits_absent_optional_fields_when_encoded() {
    let msg = WorkerMessage::Error {
        request_id: RequestId::new(),
        error: "boom".to_string(),
        stack: None,
        stderr: Vec::new(),
    };
    let json = serde_json::to_value(&msg).expect("encode");
    assert!(json.get("stack").is_none());
    assert!(json.get("stderr").is_none());
}

#[test]
fn complete_carries_cancelled_flag() {
    let msg = WorkerMessage::Complete {
        request_id: RequestId::new(),
        result: CompleteResult { total_messages: 3, result: None, cancelled: true },
    };
    let json = serde_json::to_string(&msg).expect("encode");
    let decoded: WorkerMessage = serde_json::from_str(&json).expect("decode");
    match decoded {
        WorkerMessage::Complete { result, .. } => assert!(result.cancelled),
        other => panic!("unexpected variant: {other:?}"),
    }
}
