//! JSON-RPC envelope codec: line-delimited JSON frames over a byte stream.
//!
//! One request object per line in, one response object per line out, matched
//! by the caller-supplied id. A malformed line yields a parse-error frame and
//! the stream position stays valid, so the loop continues with the next line.

use std::io::{BufRead, Write};

use serde::Serialize;
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const ERROR_PARSE: i64 = -32700;
pub const ERROR_INVALID_REQUEST: i64 = -32600;
pub const ERROR_METHOD_NOT_FOUND: i64 = -32601;
pub const ERROR_INVALID_PARAMS: i64 = -32602;

/// Tool-level error codes carried inside `tools/call` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "ProtocolError")]
    Protocol,
    #[serde(rename = "ToolNotFound")]
    ToolNotFound,
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "SafetyViolation")]
    SafetyViolation,
    #[serde(rename = "CapabilityUnavailable")]
    CapabilityUnavailable,
    #[serde(rename = "ExecutionError")]
    Execution,
}

impl ErrorCode {
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Protocol => "ProtocolError",
            ErrorCode::ToolNotFound => "ToolNotFound",
            ErrorCode::Validation => "ValidationError",
            ErrorCode::SafetyViolation => "SafetyViolation",
            ErrorCode::CapabilityUnavailable => "CapabilityUnavailable",
            ErrorCode::Execution => "ExecutionError",
        }
    }
}

/// Parsed request envelope.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    pub id: Value,
    pub method: String,
    pub params: serde_json::Map<String, Value>,
}

/// Envelope-level dispatch failure, reported as a JSON-RPC error frame.
#[derive(Debug, Clone)]
pub struct DispatchError {
    pub id: Value,
    pub code: i64,
    pub message: String,
}

impl DispatchError {
    pub fn new(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            code,
            message: message.into(),
        }
    }
}

pub fn parse_request(value: &Value) -> Result<JsonRpcRequest, DispatchError> {
    let Some(object) = value.as_object() else {
        return Err(DispatchError::new(
            Value::Null,
            ERROR_INVALID_REQUEST,
            "jsonrpc request must be an object",
        ));
    };
    let id = object.get("id").cloned().ok_or_else(|| {
        DispatchError::new(
            Value::Null,
            ERROR_INVALID_REQUEST,
            "jsonrpc request must include id",
        )
    })?;
    let jsonrpc = object
        .get("jsonrpc")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if jsonrpc != JSONRPC_VERSION {
        return Err(DispatchError::new(
            id,
            ERROR_INVALID_REQUEST,
            format!("jsonrpc must be '{JSONRPC_VERSION}'"),
        ));
    }
    let method = object
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            DispatchError::new(
                id.clone(),
                ERROR_INVALID_REQUEST,
                "jsonrpc request must include non-empty method",
            )
        })?;
    let params = match object.get("params") {
        Some(Value::Object(params)) => params.clone(),
        Some(_) => {
            return Err(DispatchError::new(
                id,
                ERROR_INVALID_PARAMS,
                "jsonrpc request params must be an object",
            ))
        }
        None => serde_json::Map::new(),
    };
    Ok(JsonRpcRequest {
        id,
        method: method.to_string(),
        params,
    })
}

pub fn request_frame(id: Value, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn result_frame(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub fn error_frame(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        }
    })
}

/// One read from the transport.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Transport closed cleanly.
    Eof,
    /// A parseable JSON frame.
    Frame(Value),
    /// A non-empty line that is not valid JSON. The stream itself is fine.
    Malformed(String),
}

pub fn read_frame<R: BufRead>(reader: &mut R) -> std::io::Result<ReadOutcome> {
    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line)?;
        if bytes == 0 {
            return Ok(ReadOutcome::Eof);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(match serde_json::from_str::<Value>(trimmed) {
            Ok(frame) => ReadOutcome::Frame(frame),
            Err(error) => ReadOutcome::Malformed(error.to_string()),
        });
    }
}

pub fn write_frame<W: Write>(writer: &mut W, frame: &Value) -> std::io::Result<()> {
    let encoded = serde_json::to_string(frame)?;
    writer.write_all(encoded.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_parse_request_accepts_minimal_envelope() {
        let frame = request_frame(json!("req-1"), "tools/list", json!({}));
        let request = parse_request(&frame).expect("valid envelope");
        assert_eq!(request.id, json!("req-1"));
        assert_eq!(request.method, "tools/list");
        assert!(request.params.is_empty());
    }

    #[test]
    fn unit_parse_request_rejects_missing_id_and_bad_version() {
        let error = parse_request(&json!({"jsonrpc": "2.0", "method": "x"}))
            .expect_err("missing id should fail");
        assert_eq!(error.code, ERROR_INVALID_REQUEST);

        let error = parse_request(&json!({"jsonrpc": "1.0", "id": 1, "method": "x"}))
            .expect_err("wrong version should fail");
        assert_eq!(error.code, ERROR_INVALID_REQUEST);
        assert_eq!(error.id, json!(1));
    }

    #[test]
    fn unit_parse_request_rejects_non_object_params() {
        let error = parse_request(&json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": [1, 2]
        }))
        .expect_err("array params should fail");
        assert_eq!(error.code, ERROR_INVALID_PARAMS);
    }

    #[test]
    fn functional_read_frame_reports_malformed_lines_without_losing_the_stream() {
        let raw = b"not json at all\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"x\"}\n";
        let mut reader = std::io::BufReader::new(&raw[..]);

        match read_frame(&mut reader).expect("read succeeds") {
            ReadOutcome::Malformed(_) => {}
            other => panic!("expected malformed outcome, got {other:?}"),
        }
        match read_frame(&mut reader).expect("read succeeds") {
            ReadOutcome::Frame(frame) => assert_eq!(frame["id"], 1),
            other => panic!("expected frame outcome, got {other:?}"),
        }
        assert!(matches!(
            read_frame(&mut reader).expect("read succeeds"),
            ReadOutcome::Eof
        ));
    }

    #[test]
    fn unit_write_frame_emits_one_line_per_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &json!({"ok": true})).expect("write succeeds");
        write_frame(&mut buffer, &json!({"ok": false})).expect("write succeeds");
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn regression_error_code_wire_names_are_stable() {
        assert_eq!(
            serde_json::to_value(ErrorCode::SafetyViolation).expect("serialize"),
            json!("SafetyViolation")
        );
        assert_eq!(ErrorCode::Validation.name(), "ValidationError");
        assert_eq!(ErrorCode::CapabilityUnavailable.name(), "CapabilityUnavailable");
    }
}
