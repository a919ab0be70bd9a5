//! Tool registry: the closed set of seven automation tools and their
//! argument contracts.
//!
//! Binding is strict. Unknown fields are rejected, declared types are
//! enforced with no coercion (a coordinate supplied as a JSON string is an
//! error, never parsed), and numeric bounds are checked before any handler
//! runs. The JSON schemas returned by `tools/list` are generated from the
//! same `ArgSpec` tables that drive binding.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use iris_providers::Capability;

/// Upper bound accepted for any screen coordinate.
pub const MAX_COORDINATE: i64 = 10_000;
/// Upper bound on typed text length, in characters.
pub const MAX_TEXT_LENGTH: usize = 10_000;
/// Upper bound on key-chord spelling length.
pub const MAX_KEY_LENGTH: usize = 128;
/// Upper bound on scroll units per request.
pub const MAX_SCROLL_AMOUNT: i64 = 100;
/// Upper bound on a single wait, in seconds.
pub const MAX_WAIT_SECONDS: f64 = 60.0;

/// Enumerates supported `ArgKind` values.
#[derive(Debug, Clone, Copy)]
pub enum ArgKind {
    Integer { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    /// Free text. Sensitive text is routed through the safety validator
    /// before any provider call.
    Text { sensitive: bool, max_len: usize },
    Choice { options: &'static [&'static str] },
}

impl ArgKind {
    fn type_name(&self) -> &'static str {
        match self {
            ArgKind::Integer { .. } => "integer",
            ArgKind::Float { .. } => "number",
            ArgKind::Text { .. } => "string",
            ArgKind::Choice { .. } => "string",
        }
    }
}

/// Per-argument declaration consumed by binding and schema generation.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub default: Option<BoundValue>,
}

impl ArgSpec {
    const fn required(name: &'static str, description: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
            default: None,
        }
    }

    const fn optional(name: &'static str, description: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            default: None,
        }
    }

    const fn with_default(
        name: &'static str,
        description: &'static str,
        kind: ArgKind,
        default: BoundValue,
    ) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            default: Some(default),
        }
    }

    pub fn is_sensitive_text(&self) -> bool {
        matches!(self.kind, ArgKind::Text { sensitive: true, .. })
    }
}

/// One tool entry: argument table plus the capability its handler needs.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub capability: Option<Capability>,
    pub args: Vec<ArgSpec>,
    /// Alternative requirement groups: the request must fully satisfy at
    /// least one group. Empty when the `required` flags say everything.
    pub one_of: &'static [&'static [&'static str]],
}

impl ToolSpec {
    /// JSON schema for `tools/list`, generated from the argument table.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for arg in &self.args {
            let mut property = serde_json::Map::new();
            property.insert("type".to_string(), json!(arg.kind.type_name()));
            property.insert("description".to_string(), json!(arg.description));
            match arg.kind {
                ArgKind::Integer { min, max } => {
                    property.insert("minimum".to_string(), json!(min));
                    property.insert("maximum".to_string(), json!(max));
                }
                ArgKind::Float { min, max } => {
                    property.insert("minimum".to_string(), json!(min));
                    property.insert("maximum".to_string(), json!(max));
                }
                ArgKind::Choice { options } => {
                    property.insert("enum".to_string(), json!(options));
                }
                ArgKind::Text { .. } => {}
            }
            if let Some(default) = &arg.default {
                property.insert("default".to_string(), default.to_json());
            }
            properties.insert(arg.name.to_string(), Value::Object(property));
            if arg.required {
                required.push(arg.name);
            }
        }

        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("additionalProperties".to_string(), json!(false));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        if !self.one_of.is_empty() {
            let groups = self
                .one_of
                .iter()
                .map(|group| json!({"required": group}))
                .collect::<Vec<_>>();
            schema.insert("oneOf".to_string(), json!(groups));
        }
        Value::Object(schema)
    }
}

/// A successfully bound argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Int(i64),
    Float(f64),
    Text(String),
    Choice(&'static str),
}

impl BoundValue {
    fn to_json(&self) -> Value {
        match self {
            BoundValue::Int(value) => json!(value),
            BoundValue::Float(value) => json!(value),
            BoundValue::Text(value) => json!(value),
            BoundValue::Choice(value) => json!(value),
        }
    }
}

/// Bound, validated arguments handed to a tool handler.
#[derive(Debug, Default)]
pub struct BoundArgs {
    values: BTreeMap<&'static str, BoundValue>,
}

impl BoundArgs {
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(BoundValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(BoundValue::Float(value)) => Some(*value),
            Some(BoundValue::Int(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(BoundValue::Text(value)) => Some(value.as_str()),
            Some(BoundValue::Choice(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set_text(&mut self, name: &'static str, value: String) {
        self.values.insert(name, BoundValue::Text(value));
    }
}

/// Binding failure, reported as a ValidationError naming the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    pub field: String,
    pub reason: String,
}

impl BindError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn bind_one(arg: &ArgSpec, value: &Value) -> Result<BoundValue, BindError> {
    match arg.kind {
        ArgKind::Integer { min, max } => {
            // Strict: "100" is a string and 1.5 is a float; neither is
            // coerced into a coordinate.
            let Some(number) = value.as_i64() else {
                return Err(BindError::new(
                    arg.name,
                    format!("expected integer, got {}", json_type_name(value)),
                ));
            };
            if number < min || number > max {
                return Err(BindError::new(
                    arg.name,
                    format!("value {number} outside bounds {min}..={max}"),
                ));
            }
            Ok(BoundValue::Int(number))
        }
        ArgKind::Float { min, max } => {
            if !value.is_number() {
                return Err(BindError::new(
                    arg.name,
                    format!("expected number, got {}", json_type_name(value)),
                ));
            }
            let Some(number) = value.as_f64() else {
                return Err(BindError::new(arg.name, "expected a finite number"));
            };
            if number < min || number > max {
                return Err(BindError::new(
                    arg.name,
                    format!("value {number} outside bounds {min}..={max}"),
                ));
            }
            Ok(BoundValue::Float(number))
        }
        ArgKind::Text { max_len, .. } => {
            let Some(text) = value.as_str() else {
                return Err(BindError::new(
                    arg.name,
                    format!("expected string, got {}", json_type_name(value)),
                ));
            };
            let length = text.chars().count();
            if length > max_len {
                return Err(BindError::new(
                    arg.name,
                    format!("length {length} exceeds maximum {max_len}"),
                ));
            }
            Ok(BoundValue::Text(text.to_string()))
        }
        ArgKind::Choice { options } => {
            let Some(text) = value.as_str() else {
                return Err(BindError::new(
                    arg.name,
                    format!("expected string, got {}", json_type_name(value)),
                ));
            };
            options
                .iter()
                .copied()
                .find(|option| *option == text)
                .map(BoundValue::Choice)
                .ok_or_else(|| {
                    BindError::new(
                        arg.name,
                        format!("must be one of {}", options.join(", ")),
                    )
                })
        }
    }
}

/// Binds `arguments` against `spec`, applying defaults and enforcing the
/// strict typing contract.
pub fn bind_arguments(
    spec: &ToolSpec,
    arguments: &serde_json::Map<String, Value>,
) -> Result<BoundArgs, BindError> {
    for field in arguments.keys() {
        if !spec.args.iter().any(|arg| arg.name == field) {
            return Err(BindError::new(
                field.clone(),
                format!("unknown field for tool '{}'", spec.name),
            ));
        }
    }

    let mut bound = BoundArgs::default();
    for arg in &spec.args {
        match arguments.get(arg.name) {
            Some(Value::Null) | None => {
                if arg.required {
                    return Err(BindError::new(arg.name, "required field is missing"));
                }
                if let Some(default) = &arg.default {
                    bound.values.insert(arg.name, default.clone());
                }
            }
            Some(value) => {
                bound.values.insert(arg.name, bind_one(arg, value)?);
            }
        }
    }

    if !spec.one_of.is_empty() {
        let satisfied = spec
            .one_of
            .iter()
            .any(|group| group.iter().all(|field| bound.contains(field)));
        if !satisfied {
            let groups = spec
                .one_of
                .iter()
                .map(|group| group.join("+"))
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(BindError::new(
                spec.name,
                format!("requires one of: {groups}"),
            ));
        }
    }

    Ok(bound)
}

/// Public struct `ToolRegistry` used across Iris components.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// The closed, load-time-constructed tool table. There is no dynamic
    /// registration path.
    pub fn builtin() -> Self {
        let coordinate = ArgKind::Integer {
            min: 0,
            max: MAX_COORDINATE,
        };
        let tools = vec![
            ToolSpec {
                name: "screenshot",
                description: "Capture a screenshot of the current display",
                capability: Some(Capability::Screenshot),
                args: vec![ArgSpec::optional(
                    "analyze",
                    "Optional analysis prompt recorded with the capture",
                    ArgKind::Text {
                        sensitive: true,
                        max_len: MAX_TEXT_LENGTH,
                    },
                )],
                one_of: &[],
            },
            ToolSpec {
                name: "click",
                description: "Click at coordinates or on a described element",
                capability: Some(Capability::Pointer),
                args: vec![
                    ArgSpec::optional("x", "X coordinate", coordinate),
                    ArgSpec::optional("y", "Y coordinate", coordinate),
                    ArgSpec::optional(
                        "element",
                        "Element description (alternative to x,y)",
                        ArgKind::Text {
                            sensitive: true,
                            max_len: MAX_TEXT_LENGTH,
                        },
                    ),
                    ArgSpec::with_default(
                        "button",
                        "Mouse button",
                        ArgKind::Choice {
                            options: &["left", "right", "middle"],
                        },
                        BoundValue::Choice("left"),
                    ),
                ],
                one_of: &[&["x", "y"], &["element"]],
            },
            ToolSpec {
                name: "type",
                description: "Type text with the keyboard",
                capability: Some(Capability::Keyboard),
                args: vec![ArgSpec::required(
                    "text",
                    "Text to type",
                    ArgKind::Text {
                        sensitive: true,
                        max_len: MAX_TEXT_LENGTH,
                    },
                )],
                one_of: &[],
            },
            ToolSpec {
                name: "key",
                description: "Press a key or key combination",
                capability: Some(Capability::Keyboard),
                args: vec![ArgSpec::required(
                    "key",
                    "Key to press (e.g. Return, Tab, ctrl+c)",
                    ArgKind::Text {
                        sensitive: true,
                        max_len: MAX_KEY_LENGTH,
                    },
                )],
                one_of: &[],
            },
            ToolSpec {
                name: "scroll",
                description: "Scroll in a direction",
                capability: Some(Capability::Pointer),
                args: vec![
                    ArgSpec::with_default(
                        "direction",
                        "Scroll direction",
                        ArgKind::Choice {
                            options: &["up", "down"],
                        },
                        BoundValue::Choice("down"),
                    ),
                    ArgSpec::with_default(
                        "amount",
                        "Number of scroll units",
                        ArgKind::Integer {
                            min: 1,
                            max: MAX_SCROLL_AMOUNT,
                        },
                        BoundValue::Int(3),
                    ),
                ],
                one_of: &[],
            },
            ToolSpec {
                name: "drag",
                description: "Click and drag from one point to another",
                capability: Some(Capability::Pointer),
                args: vec![
                    ArgSpec::required("start_x", "Starting X coordinate", coordinate),
                    ArgSpec::required("start_y", "Starting Y coordinate", coordinate),
                    ArgSpec::required("end_x", "Ending X coordinate", coordinate),
                    ArgSpec::required("end_y", "Ending Y coordinate", coordinate),
                ],
                one_of: &[],
            },
            ToolSpec {
                name: "wait",
                description: "Wait for the given number of seconds",
                capability: None,
                args: vec![ArgSpec::with_default(
                    "seconds",
                    "Seconds to wait",
                    ArgKind::Float {
                        min: 0.0,
                        max: MAX_WAIT_SECONDS,
                    },
                    BoundValue::Float(1.0),
                )],
                one_of: &[],
            },
        ];
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn unit_registry_holds_exactly_the_seven_tools() {
        let registry = ToolRegistry::builtin();
        let mut names = registry
            .tools()
            .iter()
            .map(|tool| tool.name)
            .collect::<Vec<_>>();
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["click", "drag", "key", "screenshot", "scroll", "type", "wait"]
        );
    }

    #[test]
    fn regression_string_coordinate_is_rejected_not_coerced() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("click").expect("click exists");
        let error = bind_arguments(spec, &args(json!({"x": "100", "y": 200})))
            .expect_err("string coordinate must fail");
        assert_eq!(error.field, "x");
        assert!(error.reason.contains("expected integer, got string"));
    }

    #[test]
    fn regression_float_coordinate_is_rejected() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("click").expect("click exists");
        let error = bind_arguments(spec, &args(json!({"x": 100.5, "y": 200})))
            .expect_err("fractional coordinate must fail");
        assert_eq!(error.field, "x");
    }

    #[test]
    fn unit_unknown_fields_are_rejected() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("type").expect("type exists");
        let error = bind_arguments(spec, &args(json!({"text": "hi", "speed": 4})))
            .expect_err("unknown field must fail");
        assert_eq!(error.field, "speed");
    }

    #[test]
    fn unit_defaults_are_applied_for_absent_optionals() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("scroll").expect("scroll exists");
        let bound = bind_arguments(spec, &args(json!({}))).expect("empty arguments bind");
        assert_eq!(bound.text("direction"), Some("down"));
        assert_eq!(bound.int("amount"), Some(3));

        let spec = registry.get("wait").expect("wait exists");
        let bound = bind_arguments(spec, &args(json!({}))).expect("empty arguments bind");
        assert_eq!(bound.float("seconds"), Some(1.0));
    }

    #[test]
    fn unit_bounds_are_enforced() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("drag").expect("drag exists");
        let error = bind_arguments(
            spec,
            &args(json!({"start_x": 0, "start_y": 0, "end_x": 99999, "end_y": 5})),
        )
        .expect_err("out-of-bounds coordinate must fail");
        assert_eq!(error.field, "end_x");

        let spec = registry.get("scroll").expect("scroll exists");
        let error = bind_arguments(spec, &args(json!({"amount": 101})))
            .expect_err("excessive scroll must fail");
        assert_eq!(error.field, "amount");

        let spec = registry.get("wait").expect("wait exists");
        let error = bind_arguments(spec, &args(json!({"seconds": 61.0})))
            .expect_err("excessive wait must fail");
        assert_eq!(error.field, "seconds");
    }

    #[test]
    fn unit_click_requires_coordinates_or_element() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("click").expect("click exists");

        let error =
            bind_arguments(spec, &args(json!({}))).expect_err("empty click must fail");
        assert!(error.reason.contains("requires one of"));

        let error = bind_arguments(spec, &args(json!({"x": 10})))
            .expect_err("x without y must fail");
        assert!(error.reason.contains("requires one of"));

        assert!(bind_arguments(spec, &args(json!({"x": 10, "y": 20}))).is_ok());
        assert!(bind_arguments(spec, &args(json!({"element": "OK button"}))).is_ok());
    }

    #[test]
    fn unit_enum_arguments_reject_unknown_variants() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("click").expect("click exists");
        let error = bind_arguments(spec, &args(json!({"x": 1, "y": 2, "button": "center"})))
            .expect_err("unknown button must fail");
        assert_eq!(error.field, "button");
        assert!(error.reason.contains("left, right, middle"));
    }

    #[test]
    fn unit_wait_accepts_integer_seconds() {
        let registry = ToolRegistry::builtin();
        let spec = registry.get("wait").expect("wait exists");
        let bound = bind_arguments(spec, &args(json!({"seconds": 2}))).expect("integer binds");
        assert_eq!(bound.float("seconds"), Some(2.0));
    }

    #[test]
    fn unit_schema_generation_reflects_the_argument_table() {
        let registry = ToolRegistry::builtin();
        let schema = registry.get("click").expect("click exists").input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["x"]["type"], "integer");
        assert_eq!(schema["properties"]["x"]["maximum"], MAX_COORDINATE);
        assert_eq!(schema["properties"]["button"]["default"], "left");
        assert_eq!(
            schema["oneOf"],
            json!([{"required": ["x", "y"]}, {"required": ["element"]}])
        );

        let schema = registry.get("type").expect("type exists").input_schema();
        assert_eq!(schema["required"], json!(["text"]));
    }
}
