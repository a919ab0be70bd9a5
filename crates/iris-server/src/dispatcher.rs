//! Protocol dispatcher: request lifecycle, safety gating, and tool handlers.
//!
//! Owns the serving loop's per-request flow: decode envelope, resolve tool,
//! bind arguments strictly, run the safety validator over sensitive text,
//! then invoke the injected providers. A Block verdict aborts the request
//! before any provider call. No error path terminates the loop; only
//! transport closure does.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use serde_json::{json, Value};

use iris_providers::{
    Capability, KeyboardProvider, PointerButton, PointerProvider, ProviderBundle, ProviderError,
    ScreenshotProvider, ScrollDirection,
};
use iris_safety::{EvalContext, SafetyValidator, SafetyVerdict};

use crate::protocol::{
    error_frame, parse_request, read_frame, result_frame, write_frame, DispatchError, ErrorCode,
    JsonRpcRequest, ReadOutcome, ERROR_INVALID_PARAMS, ERROR_INVALID_REQUEST,
    ERROR_METHOD_NOT_FOUND, ERROR_PARSE, PROTOCOL_VERSION,
};
use crate::registry::{bind_arguments, BindError, BoundArgs, ToolRegistry, ToolSpec};

const SERVER_NAME: &str = "iris-server";

/// Wait is served in bounded slices rather than one long sleep; the slice
/// boundary is the interruption point if the transport ever grows
/// mid-request cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// Enumerates supported `Lifecycle` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    ServingRequest,
    ShuttingDown,
}

/// Public struct `ServeReport` used across Iris components.
#[derive(Debug, Clone)]
pub struct ServeReport {
    pub processed_frames: usize,
    pub error_count: usize,
}

/// Tool-level failure, reported inside a well-formed `tools/call` result.
#[derive(Debug)]
struct ToolError {
    code: ErrorCode,
    message: String,
    data: serde_json::Map<String, Value>,
}

impl ToolError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: serde_json::Map::new(),
        }
    }

    fn not_found(name: &str) -> Self {
        Self::new(ErrorCode::ToolNotFound, format!("unknown tool '{name}'"))
    }

    fn validation(error: BindError) -> Self {
        let mut tool_error = Self::new(
            ErrorCode::Validation,
            format!("invalid argument '{}': {}", error.field, error.reason),
        );
        tool_error
            .data
            .insert("field".to_string(), json!(error.field));
        tool_error
    }

    /// The verdict explanation names the category and rule id only; the
    /// matched text never appears in the response.
    fn safety(verdict: &SafetyVerdict) -> Self {
        let mut tool_error = Self::new(ErrorCode::SafetyViolation, verdict.explanation.clone());
        if let Some(category) = verdict.category {
            tool_error
                .data
                .insert("category".to_string(), json!(category));
        }
        if let Some(rule_id) = verdict.matched_rule_id {
            tool_error.data.insert("rule_id".to_string(), json!(rule_id));
        }
        tool_error
    }

    fn capability(capability: Capability) -> Self {
        let mut tool_error = Self::new(
            ErrorCode::CapabilityUnavailable,
            format!(
                "capability '{}' is not available on this host",
                capability.name()
            ),
        );
        tool_error
            .data
            .insert("capability".to_string(), json!(capability.name()));
        tool_error
    }

    fn execution(action: &str, error: ProviderError) -> Self {
        let mut tool_error =
            Self::new(ErrorCode::Execution, format!("{action} failed"));
        // Provider failure detail rides along as opaque diagnostic data.
        tool_error
            .data
            .insert("detail".to_string(), json!(error.to_string()));
        tool_error
    }

    fn execution_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Execution, message)
    }
}

/// Public struct `Dispatcher` used across Iris components.
pub struct Dispatcher {
    registry: ToolRegistry,
    validator: SafetyValidator,
    providers: ProviderBundle,
    lifecycle: Lifecycle,
}

impl Dispatcher {
    pub fn new(providers: ProviderBundle) -> Self {
        Self::with_validator(providers, SafetyValidator::new())
    }

    pub fn with_validator(providers: ProviderBundle, validator: SafetyValidator) -> Self {
        Self {
            registry: ToolRegistry::builtin(),
            validator,
            providers,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &SafetyValidator {
        &self.validator
    }

    pub fn shutdown(&mut self) {
        self.lifecycle = Lifecycle::ShuttingDown;
    }

    /// Handles one decoded frame and always returns a response frame.
    pub fn handle_frame(&mut self, frame: &Value) -> Value {
        match parse_request(frame) {
            Ok(request) => match self.dispatch(&request) {
                Ok(result) => result_frame(request.id, result),
                Err(error) => error_frame(error.id, error.code, error.message),
            },
            Err(error) => error_frame(error.id, error.code, error.message),
        }
    }

    fn dispatch(&mut self, request: &JsonRpcRequest) -> Result<Value, DispatchError> {
        match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "tools/list" => {
                self.ensure_ready(&request.id)?;
                Ok(self.handle_tools_list())
            }
            "tools/call" => {
                self.ensure_ready(&request.id)?;
                self.handle_tools_call(request)
            }
            other => Err(DispatchError::new(
                request.id.clone(),
                ERROR_METHOD_NOT_FOUND,
                format!("unsupported method '{other}'"),
            )),
        }
    }

    fn ensure_ready(&self, id: &Value) -> Result<(), DispatchError> {
        match self.lifecycle {
            Lifecycle::Ready | Lifecycle::ServingRequest => Ok(()),
            Lifecycle::Uninitialized | Lifecycle::ShuttingDown => Err(DispatchError::new(
                id.clone(),
                ERROR_INVALID_REQUEST,
                "server not initialized; send initialize first",
            )),
        }
    }

    fn handle_initialize(&mut self) -> Value {
        self.lifecycle = Lifecycle::Ready;
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "platform": self.providers.platform().report(),
        })
    }

    fn handle_tools_list(&self) -> Value {
        let mut tools = self
            .registry
            .tools()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect::<Vec<_>>();
        tools.sort_by(|left, right| {
            left["name"]
                .as_str()
                .unwrap_or_default()
                .cmp(right["name"].as_str().unwrap_or_default())
        });
        json!({ "tools": tools })
    }

    fn handle_tools_call(&mut self, request: &JsonRpcRequest) -> Result<Value, DispatchError> {
        let tool_name = request
            .params
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                DispatchError::new(
                    request.id.clone(),
                    ERROR_INVALID_PARAMS,
                    "tools/call requires non-empty field 'name'",
                )
            })?
            .to_string();
        let arguments = match request.params.get("arguments") {
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Err(DispatchError::new(
                    request.id.clone(),
                    ERROR_INVALID_PARAMS,
                    "tools/call field 'arguments' must be an object when provided",
                ))
            }
            None => serde_json::Map::new(),
        };

        self.lifecycle = Lifecycle::ServingRequest;
        let outcome = self.call_tool(&tool_name, &arguments);
        self.lifecycle = Lifecycle::Ready;
        Ok(tool_call_result(&tool_name, outcome))
    }

    fn call_tool(
        &self,
        tool_name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let spec = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::not_found(tool_name))?;

        let mut bound = bind_arguments(spec, arguments).map_err(ToolError::validation)?;
        let redacted_fields = self.gate_sensitive_arguments(spec, &mut bound)?;

        tracing::debug!(tool = tool_name, "invoking tool handler");
        let mut payload = match spec.name {
            "screenshot" => self.run_screenshot(&bound),
            "click" => self.run_click(&bound),
            "type" => self.run_type(&bound),
            "key" => self.run_key(&bound),
            "scroll" => self.run_scroll(&bound),
            "drag" => self.run_drag(&bound),
            "wait" => self.run_wait(&bound),
            other => Err(ToolError::not_found(other)),
        }?;

        if !redacted_fields.is_empty() {
            if let Value::Object(object) = &mut payload {
                object.insert("redacted_fields".to_string(), json!(redacted_fields));
            }
        }
        Ok(payload)
    }

    /// Runs the safety validator over every sensitive text argument. Block
    /// aborts the call; Redact rewrites the bound value in place.
    fn gate_sensitive_arguments(
        &self,
        spec: &ToolSpec,
        bound: &mut BoundArgs,
    ) -> Result<Vec<&'static str>, ToolError> {
        let mut redacted_fields = Vec::new();
        for arg in &spec.args {
            if !arg.is_sensitive_text() {
                continue;
            }
            let Some(text) = bound.text(arg.name).map(str::to_string) else {
                continue;
            };
            let context = if spec.name == "key" {
                EvalContext::KeyInput
            } else {
                EvalContext::FreeText
            };
            let verdict = self.validator.evaluate_in_context(&text, context);
            if verdict.is_block() {
                tracing::warn!(
                    tool = spec.name,
                    field = arg.name,
                    rule = verdict.matched_rule_id,
                    "blocked unsafe argument"
                );
                return Err(ToolError::safety(&verdict));
            }
            if verdict.is_redact() {
                bound.set_text(arg.name, self.validator.redact(&text));
                redacted_fields.push(arg.name);
            }
        }
        Ok(redacted_fields)
    }

    fn require_screenshot(&self) -> Result<&dyn ScreenshotProvider, ToolError> {
        self.providers
            .screenshot()
            .ok_or_else(|| ToolError::capability(Capability::Screenshot))
    }

    fn require_pointer(&self) -> Result<&dyn PointerProvider, ToolError> {
        self.providers
            .pointer()
            .ok_or_else(|| ToolError::capability(Capability::Pointer))
    }

    fn require_keyboard(&self) -> Result<&dyn KeyboardProvider, ToolError> {
        self.providers
            .keyboard()
            .ok_or_else(|| ToolError::capability(Capability::Keyboard))
    }

    fn run_screenshot(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let provider = self.require_screenshot()?;
        let captured = provider
            .capture()
            .map_err(|error| ToolError::execution("screenshot capture", error))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&captured.png_data);
        let mut payload = json!({
            "action": "screenshot",
            "backend": captured.backend,
            "bytes": captured.png_data.len(),
            "image": encoded,
        });
        if let Some(analyze) = bound.text("analyze") {
            if let Value::Object(object) = &mut payload {
                object.insert("analyze".to_string(), json!(analyze));
            }
        }
        Ok(payload)
    }

    fn run_click(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let pointer = self.require_pointer()?;
        let (Some(x), Some(y)) = (bound.int("x"), bound.int("y")) else {
            // Element descriptions need screen analysis, which this core
            // deliberately does not perform.
            return Err(ToolError::execution_unsupported(
                "element targeting requires screen analysis; supply x and y",
            ));
        };
        let button = bound
            .text("button")
            .and_then(PointerButton::from_name)
            .unwrap_or(PointerButton::Left);
        pointer
            .click(x, y, button)
            .map_err(|error| ToolError::execution("click", error))?;
        Ok(json!({
            "action": "click",
            "x": x,
            "y": y,
            "button": button.name(),
        }))
    }

    fn run_type(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let keyboard = self.require_keyboard()?;
        let text = bound.text("text").unwrap_or_default();
        keyboard
            .type_text(text)
            .map_err(|error| ToolError::execution("type", error))?;
        // Report length only; the text itself never appears in responses.
        Ok(json!({
            "action": "type",
            "text_length": text.chars().count(),
        }))
    }

    fn run_key(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let keyboard = self.require_keyboard()?;
        let key = bound.text("key").unwrap_or_default();
        keyboard
            .key_press(key)
            .map_err(|error| ToolError::execution("key press", error))?;
        Ok(json!({
            "action": "key",
            "key": key,
        }))
    }

    fn run_scroll(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let pointer = self.require_pointer()?;
        let direction = bound
            .text("direction")
            .and_then(ScrollDirection::from_name)
            .unwrap_or(ScrollDirection::Down);
        let amount = bound.int("amount").unwrap_or(3);
        pointer
            .scroll(direction, amount)
            .map_err(|error| ToolError::execution("scroll", error))?;
        Ok(json!({
            "action": "scroll",
            "direction": direction.name(),
            "amount": amount,
        }))
    }

    fn run_drag(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let pointer = self.require_pointer()?;
        let (start_x, start_y) = (
            bound.int("start_x").unwrap_or_default(),
            bound.int("start_y").unwrap_or_default(),
        );
        let (end_x, end_y) = (
            bound.int("end_x").unwrap_or_default(),
            bound.int("end_y").unwrap_or_default(),
        );
        pointer
            .drag(start_x, start_y, end_x, end_y)
            .map_err(|error| ToolError::execution("drag", error))?;
        Ok(json!({
            "action": "drag",
            "start": [start_x, start_y],
            "end": [end_x, end_y],
        }))
    }

    fn run_wait(&self, bound: &BoundArgs) -> Result<Value, ToolError> {
        let seconds = bound.float("seconds").unwrap_or(1.0);
        let mut remaining = Duration::from_secs_f64(seconds.max(0.0));
        while !remaining.is_zero() {
            let slice = remaining.min(WAIT_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
        Ok(json!({
            "action": "wait",
            "seconds": seconds,
        }))
    }
}

fn tool_call_result(tool_name: &str, outcome: Result<Value, ToolError>) -> Value {
    match outcome {
        Ok(payload) => {
            let structured = json!({
                "success": true,
                "payload": payload,
            });
            let text = serde_json::to_string_pretty(&structured)
                .unwrap_or_else(|_| format!("{tool_name} completed"));
            json!({
                "content": [{
                    "type": "text",
                    "text": text,
                }],
                "isError": false,
                "structuredContent": structured,
            })
        }
        Err(error) => {
            let mut error_object = serde_json::Map::new();
            error_object.insert("code".to_string(), json!(error.code));
            error_object.insert("message".to_string(), json!(error.message));
            for (key, value) in error.data {
                error_object.insert(key, value);
            }
            let structured = json!({
                "success": false,
                "error": Value::Object(error_object),
            });
            let text = format!("{}: {}", error.code.name(), error.message);
            json!({
                "content": [{
                    "type": "text",
                    "text": text,
                }],
                "isError": true,
                "structuredContent": structured,
            })
        }
    }
}

/// Serves line-delimited JSON-RPC frames until the transport closes.
/// Requests are answered strictly in arrival order; no error category
/// terminates the loop.
pub fn serve<R, W>(
    reader: &mut R,
    writer: &mut W,
    dispatcher: &mut Dispatcher,
) -> Result<ServeReport>
where
    R: BufRead,
    W: Write,
{
    let mut processed_frames = 0_usize;
    let mut error_count = 0_usize;

    loop {
        match read_frame(reader).context("failed to read request frame")? {
            ReadOutcome::Eof => break,
            ReadOutcome::Malformed(detail) => {
                processed_frames = processed_frames.saturating_add(1);
                error_count = error_count.saturating_add(1);
                let response = error_frame(
                    Value::Null,
                    ERROR_PARSE,
                    format!("invalid JSON frame: {detail}"),
                );
                write_frame(writer, &response).context("failed to write response frame")?;
            }
            ReadOutcome::Frame(frame) => {
                processed_frames = processed_frames.saturating_add(1);
                let response = dispatcher.handle_frame(&frame);
                if response.get("error").is_some() {
                    error_count = error_count.saturating_add(1);
                }
                write_frame(writer, &response).context("failed to write response frame")?;
            }
        }
    }

    dispatcher.shutdown();
    Ok(ServeReport {
        processed_frames,
        error_count,
    })
}
