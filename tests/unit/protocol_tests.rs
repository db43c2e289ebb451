//! Unit tests for the wire protocol: envelope parsing and frame shapes.

use loomd::models::session::SessionPhase;
use loomd::models::task::TaskKind;
use loomd::protocol::{
    parse_request_line, Broadcast, ErrorBody, ParseError, Reply, Request, ServerFrame,
};
use loomd::WorkerError;

#[test]
fn run_task_envelope_parses_camel_case_fields() {
    let line = r#"{"id":"7","kind":"run-task","payload":{"text":"hello","taskKind":"summarize"}}"#;
    let envelope = parse_request_line(line).expect("parse");
    assert_eq!(envelope.id.as_deref(), Some("7"));
    match envelope.request {
        Request::RunTask {
            text,
            task_kind,
            options,
        } => {
            assert_eq!(text, "hello");
            assert_eq!(task_kind, TaskKind::Summarize);
            assert!(options.is_none());
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn run_options_parse_camel_case() {
    let line = r#"{"kind":"run-task","payload":{"text":"t","taskKind":"rewrite","options":{"maxTokens":64,"topP":0.5}}}"#;
    let envelope = parse_request_line(line).expect("parse");
    match envelope.request {
        Request::RunTask { options, .. } => {
            let options = options.expect("options");
            assert_eq!(options.max_tokens, Some(64));
            assert_eq!(options.top_p, Some(0.5));
            assert!(options.temperature.is_none());
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn missing_payload_defaults_to_empty() {
    let envelope = parse_request_line(r#"{"kind":"get-status"}"#).expect("parse");
    assert_eq!(envelope.request, Request::GetStatus {});
    assert!(envelope.id.is_none());
}

#[test]
fn load_model_payload_may_omit_session_id() {
    let envelope = parse_request_line(r#"{"kind":"load-model","payload":{}}"#).expect("parse");
    assert_eq!(envelope.request, Request::LoadModel { session_id: None });
}

#[test]
fn unknown_kind_is_reported_with_id() {
    let err = parse_request_line(r#"{"id":"9","kind":"self-destruct","payload":{}}"#)
        .expect_err("must fail");
    match err {
        ParseError::UnrecognizedKind { kind, id } => {
            assert_eq!(kind, "self-destruct");
            assert_eq!(id.as_deref(), Some("9"));
        }
        ParseError::Malformed(msg) => panic!("wrong error: {msg}"),
    }
}

#[test]
fn missing_kind_is_malformed() {
    assert!(matches!(
        parse_request_line(r#"{"payload":{}}"#),
        Err(ParseError::Malformed(_))
    ));
}

#[test]
fn non_object_line_is_malformed() {
    assert!(matches!(
        parse_request_line(r#""get-status""#),
        Err(ParseError::Malformed(_))
    ));
    assert!(matches!(
        parse_request_line("{"),
        Err(ParseError::Malformed(_))
    ));
}

#[test]
fn payload_type_mismatch_is_malformed() {
    let err = parse_request_line(r#"{"kind":"run-task","payload":{"text":42,"taskKind":"summarize"}}"#)
        .expect_err("must fail");
    assert!(matches!(err, ParseError::Malformed(_)));
}

#[test]
fn success_reply_omits_error_field() {
    let reply = Reply::success(Some("1".into()), serde_json::json!({ "ok": true }));
    let json = serde_json::to_value(&reply).expect("serialize");
    assert_eq!(json["id"], "1");
    assert_eq!(json["ok"], true);
    assert!(json.get("error").is_none());
}

#[test]
fn failure_reply_carries_structured_error() {
    let body = ErrorBody::from_error(&WorkerError::NotReady("no model loaded".into()));
    let reply = Reply::failure(None, body);
    let json = serde_json::to_value(&reply).expect("serialize");
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "not_ready");
    assert!(json.get("data").is_none());
    assert!(json["error"].get("needsLoad").is_none());
}

#[test]
fn reply_frame_is_tagged() {
    let frame = ServerFrame::Reply(Reply::success(None, serde_json::json!({})));
    let json = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(json["type"], "reply");
}

#[test]
fn broadcast_frame_round_trips() {
    let frame = ServerFrame::Broadcast(Broadcast::Loaded {
        session_id: "tinyllama-1.1b-chat-q4".into(),
    });
    let json = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(json["type"], "broadcast");
    assert_eq!(json["kind"], "loaded");
    assert_eq!(json["payload"]["sessionId"], "tinyllama-1.1b-chat-q4");

    let back: ServerFrame = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, frame);
}

#[test]
fn progress_broadcast_uses_camel_case_payload() {
    let json = serde_json::to_value(Broadcast::LoadingProgress {
        percent: 42,
        message: "fetching weights".into(),
    })
    .expect("serialize");
    assert_eq!(json["kind"], "loading-progress");
    assert_eq!(json["payload"]["percent"], 42);
    assert_eq!(json["payload"]["message"], "fetching weights");
}

#[test]
fn status_snapshot_broadcast_includes_phase() {
    let json = serde_json::to_value(Broadcast::StatusSnapshot {
        phase: SessionPhase::Unloaded,
        session_id: None,
    })
    .expect("serialize");
    assert_eq!(json["kind"], "status-snapshot");
    assert_eq!(json["payload"]["phase"], "unloaded");
    assert_eq!(json["payload"]["sessionId"], serde_json::Value::Null);
}

#[test]
fn unloaded_broadcast_has_empty_payload() {
    let json = serde_json::to_value(Broadcast::Unloaded {}).expect("serialize");
    assert_eq!(json["kind"], "unloaded");
    assert_eq!(json["payload"], serde_json::json!({}));
}
