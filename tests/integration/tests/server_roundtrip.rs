//! End-to-end round-trips over the serving loop with doubles substituted at
//! construction time.

use serde_json::{json, Value};

use iris_providers::doubles::{
    EventLog, FixedPlatformInfo, RecordingKeyboard, RecordingPointer, StaticScreenshot,
};
use iris_providers::{PlatformDescriptor, ProviderBundle};
use iris_safety::{
    SafetyValidator, ADVERSARIAL_DESTRUCTIVE_MULTILINE, ADVERSARIAL_INJECTION_PIPE_SHELL,
};
use iris_server::{request_frame, serve, Dispatcher};

fn recording_bundle() -> (ProviderBundle, EventLog, EventLog) {
    let (pointer, pointer_log) = RecordingPointer::new();
    let (keyboard, keyboard_log) = RecordingKeyboard::new();
    let bundle = ProviderBundle::new(
        Some(Box::new(StaticScreenshot::default())),
        Some(Box::new(pointer)),
        Some(Box::new(keyboard)),
        Box::new(FixedPlatformInfo::new(PlatformDescriptor::x11(), true)),
    );
    (bundle, pointer_log, keyboard_log)
}

fn encode_lines(frames: &[Value]) -> Vec<u8> {
    let mut encoded = Vec::new();
    for frame in frames {
        encoded.extend_from_slice(serde_json::to_string(frame).expect("encode").as_bytes());
        encoded.push(b'\n');
    }
    encoded
}

fn decode_lines(raw: &[u8]) -> Vec<Value> {
    String::from_utf8(raw.to_vec())
        .expect("utf8 output")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

fn run_frames(frames: &[Value]) -> (Vec<Value>, EventLog, EventLog) {
    let (bundle, pointer_log, keyboard_log) = recording_bundle();
    let mut dispatcher = Dispatcher::new(bundle);
    let raw = encode_lines(frames);
    let mut reader = std::io::BufReader::new(std::io::Cursor::new(raw));
    let mut writer = Vec::new();
    serve(&mut reader, &mut writer, &mut dispatcher).expect("serve should succeed");
    (decode_lines(&writer), pointer_log, keyboard_log)
}

#[test]
fn integration_tools_list_exposes_exactly_the_seven_tools_with_schemas() {
    let (responses, _, _) = run_frames(&[
        request_frame(json!("init"), "initialize", json!({})),
        request_frame(json!("list"), "tools/list", json!({})),
    ]);

    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    let tools = responses[1]["result"]["tools"]
        .as_array()
        .expect("tools array");
    let names = tools
        .iter()
        .map(|tool| tool["name"].as_str().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["click", "drag", "key", "screenshot", "scroll", "type", "wait"]
    );
    for tool in tools {
        assert!(tool["description"].is_string());
        assert_eq!(tool["inputSchema"]["type"], "object");
        assert_eq!(tool["inputSchema"]["additionalProperties"], false);
    }
}

#[test]
fn integration_destructive_type_returns_safety_violation_without_provider_call() {
    let (responses, pointer_log, keyboard_log) = run_frames(&[
        request_frame(json!("init"), "initialize", json!({})),
        request_frame(
            json!("call"),
            "tools/call",
            json!({"name": "type", "arguments": {"text": "rm -rf /"}}),
        ),
    ]);

    let result = &responses[1]["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["success"], false);
    assert_eq!(result["structuredContent"]["error"]["code"], "SafetyViolation");
    assert_eq!(result["structuredContent"]["error"]["category"], "Destructive");
    assert!(keyboard_log.is_empty());
    assert!(pointer_log.is_empty());
}

#[test]
fn integration_request_ordering_is_preserved_across_mixed_outcomes() {
    let (responses, _, keyboard_log) = run_frames(&[
        request_frame(json!("r0"), "initialize", json!({})),
        request_frame(
            json!("r1"),
            "tools/call",
            json!({"name": "screenshot", "arguments": {}}),
        ),
        request_frame(
            json!("r2"),
            "tools/call",
            json!({"name": "type", "arguments": {"text": ADVERSARIAL_DESTRUCTIVE_MULTILINE}}),
        ),
        request_frame(
            json!("r3"),
            "tools/call",
            json!({"name": "wait", "arguments": {"seconds": 0}}),
        ),
    ]);

    let ids = responses
        .iter()
        .map(|response| response["id"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["r0", "r1", "r2", "r3"]);
    assert_eq!(responses[1]["result"]["structuredContent"]["success"], true);
    assert_eq!(
        responses[2]["result"]["structuredContent"]["error"]["code"],
        "SafetyViolation"
    );
    assert_eq!(responses[3]["result"]["structuredContent"]["success"], true);
    assert!(keyboard_log.is_empty());
}

#[test]
fn integration_malformed_bytes_then_valid_request_keeps_serving() {
    let (bundle, _, _) = recording_bundle();
    let mut dispatcher = Dispatcher::new(bundle);

    let mut raw = b"\x01\x02 not json\n".to_vec();
    raw.extend_from_slice(&encode_lines(&[
        request_frame(json!("init"), "initialize", json!({})),
        request_frame(json!("list"), "tools/list", json!({})),
    ]));

    let mut reader = std::io::BufReader::new(std::io::Cursor::new(raw));
    let mut writer = Vec::new();
    let report = serve(&mut reader, &mut writer, &mut dispatcher).expect("serve should succeed");
    assert_eq!(report.processed_frames, 3);
    assert_eq!(report.error_count, 1);

    let responses = decode_lines(&writer);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert!(responses[0]["id"].is_null());
    assert_eq!(responses[1]["id"], "init");
    assert_eq!(responses[2]["id"], "list");
    assert!(responses[2]["result"]["tools"].is_array());
}

#[test]
fn integration_injection_corpus_is_blocked_and_click_still_works_afterwards() {
    let (responses, pointer_log, _) = run_frames(&[
        request_frame(json!("init"), "initialize", json!({})),
        request_frame(
            json!("inject"),
            "tools/call",
            json!({"name": "type", "arguments": {"text": ADVERSARIAL_INJECTION_PIPE_SHELL}}),
        ),
        request_frame(
            json!("click"),
            "tools/call",
            json!({"name": "click", "arguments": {"x": 10, "y": 20}}),
        ),
    ]);

    assert_eq!(
        responses[1]["result"]["structuredContent"]["error"]["code"],
        "SafetyViolation"
    );
    assert_eq!(
        responses[1]["result"]["structuredContent"]["error"]["category"],
        "Injection"
    );
    assert_eq!(responses[2]["result"]["structuredContent"]["success"], true);
    assert_eq!(pointer_log.events(), vec!["click 10,20 left".to_string()]);
}

#[test]
fn integration_validator_counters_show_cache_reuse_across_requests() {
    let (bundle, _, _) = recording_bundle();
    let validator = SafetyValidator::new();
    let mut dispatcher = Dispatcher::with_validator(bundle, validator);

    let repeated = json!({"name": "type", "arguments": {"text": "echo $(uname -a)"}});
    let frames = vec![
        request_frame(json!("init"), "initialize", json!({})),
        request_frame(json!("a"), "tools/call", repeated.clone()),
        request_frame(json!("b"), "tools/call", repeated),
    ];
    let raw = encode_lines(&frames);
    let mut reader = std::io::BufReader::new(std::io::Cursor::new(raw));
    let mut writer = Vec::new();
    serve(&mut reader, &mut writer, &mut dispatcher).expect("serve should succeed");

    let counters = dispatcher.validator().counters();
    assert_eq!(counters.expensive_evaluations, 1);
    assert_eq!(counters.cache.hits, 1);
}
