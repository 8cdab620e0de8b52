//! Step protocol value types.
//!
//! The model answers every turn with exactly one step: either it wants to
//! call tools, or it is done. Tool executions produce outcomes that are fed
//! back on the next turn.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request from the model to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute, resolved by the registry
    pub name: String,

    /// Open key/value argument bag; validated by the tool, not the loop
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Build a call from a JSON value. Anything but an object yields no arguments.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// The arguments as a JSON object value.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// The result of executing one [`ToolCall`].
///
/// Exactly one of payload / error is present; the constructors are the only
/// way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    tool_name: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ToolOutcome {
    pub fn success(tool_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: true,
            payload: Some(payload.into()),
            error: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Build from a registry result.
    pub fn from_result(tool_name: impl Into<String>, result: Result<String, String>) -> Self {
        match result {
            Ok(payload) => Self::success(tool_name, payload),
            Err(error) => Self::failure(tool_name, error),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The text the model sees for this outcome: the payload, or `ERROR: <message>`.
    pub fn feedback_text(&self) -> String {
        match (&self.payload, &self.error) {
            (Some(payload), _) => payload.clone(),
            (None, Some(error)) => format!("ERROR: {error}"),
            (None, None) => String::new(),
        }
    }
}

/// Domain-defined record attached to a final step. Opaque to the loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredSummary(Map<String, Value>);

impl StructuredSummary {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value; only objects qualify as summaries.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Deserialize the summary into a caller-defined typed view.
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

/// The model wants tools run before it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStep {
    pub calls: Vec<ToolCall>,
}

/// The model is done.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalStep {
    pub answer: String,
    pub summary: Option<StructuredSummary>,
}

impl FinalStep {
    pub fn answer(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            summary: None,
        }
    }
}

/// One decoded model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResponse {
    Tool(ToolStep),
    Final(FinalStep),
}

impl StepResponse {
    pub fn is_final(&self) -> bool {
        matches!(self, StepResponse::Final(_))
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StepResponse::Tool(_) => "tool",
            StepResponse::Final(_) => "final",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_has_exactly_one_side() {
        let ok = ToolOutcome::success("list_x", "[1]");
        assert!(ok.is_ok());
        assert_eq!(ok.payload(), Some("[1]"));
        assert!(ok.error().is_none());

        let err = ToolOutcome::failure("list_x", "boom");
        assert!(!err.is_ok());
        assert!(err.payload().is_none());
        assert_eq!(err.feedback_text(), "ERROR: boom");
    }

    #[test]
    fn tool_call_from_non_object_has_no_arguments() {
        let call = ToolCall::new("noop", json!("not an object"));
        assert!(call.arguments.is_empty());
        let call = ToolCall::new("add", json!({"a": 1}));
        assert_eq!(call.arguments["a"], json!(1));
    }

    #[derive(Deserialize)]
    struct Titled {
        title: String,
    }

    #[test]
    fn summary_parses_into_typed_view() {
        let summary = StructuredSummary::from_value(json!({"title": "t", "extra": 1})).unwrap();
        let typed: Titled = summary.parse_as().unwrap();
        assert_eq!(typed.title, "t");
        assert!(StructuredSummary::from_value(json!([1, 2])).is_none());
    }
}
