//! Model reply → [`StepResponse`].
//!
//! Pipeline: strip markdown fences, parse, repair on failure, validate the
//! shape. A reply that cannot be read as a document and does not even look
//! like one (no leading `{`) is taken as a plain-prose final answer.

use serde_json::{Map, Value};
use stepwise_core::{DecodeError, FinalStep, StepResponse, StructuredSummary, ToolCall, ToolStep};
use tracing::{debug, warn};

use crate::repair::{RepairRule, repair_with_report};

/// How a reply was turned into a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub step: StepResponse,
    /// Repair rules that fired before the text parsed.
    pub repairs: Vec<RepairRule>,
    /// The reply was not a document and became the answer verbatim.
    pub degraded: bool,
}

/// Decode one raw model reply.
pub fn decode(raw: &str) -> Result<StepResponse, DecodeError> {
    decode_with_report(raw).map(|decoded| decoded.step)
}

/// Like [`decode`], also reporting repairs and prose degradation.
pub fn decode_with_report(raw: &str) -> Result<Decoded, DecodeError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(DecodeError::ProtocolViolation("empty reply".into()));
    }

    let (doc, repairs) = match serde_json::from_str::<Value>(text) {
        Ok(doc) => (doc, Vec::new()),
        Err(parse_error) => {
            let repaired = repair_with_report(text);
            match serde_json::from_str::<Value>(&repaired.text) {
                Ok(doc) => {
                    debug!(rules = ?repaired.applied, "Reply parsed after repair");
                    (doc, repaired.applied)
                }
                Err(_) if !looks_like_document(text) => return Ok(prose(text)),
                Err(_) => {
                    return Err(DecodeError::Unrecoverable(format!(
                        "{parse_error} (after {} repair rule(s))",
                        repaired.applied.len()
                    )));
                }
            }
        }
    };

    match validate(doc) {
        Ok(step) => Ok(Decoded {
            step,
            repairs,
            degraded: false,
        }),
        Err(violation) if !looks_like_document(text) => {
            debug!(error = %violation, "Reply is not a step document, treating it as prose");
            Ok(prose(text))
        }
        Err(violation) => Err(violation),
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing
/// ```` ``` ````, then trim.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn looks_like_document(text: &str) -> bool {
    text.starts_with('{')
}

fn prose(text: &str) -> Decoded {
    Decoded {
        step: StepResponse::Final(FinalStep::answer(text)),
        repairs: Vec::new(),
        degraded: true,
    }
}

fn violation(message: impl Into<String>) -> DecodeError {
    DecodeError::ProtocolViolation(message.into())
}

/// Check the document shape and build the step.
fn validate(doc: Value) -> Result<StepResponse, DecodeError> {
    let Value::Object(mut obj) = doc else {
        return Err(violation("reply is not a JSON object"));
    };

    let step = obj
        .get("step")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .ok_or_else(|| violation("missing `step` discriminator"))?;

    let calls = take_calls(&mut obj)?;

    match step.as_str() {
        "tool" => {
            if calls.is_empty() {
                return Err(violation("`tool` step without calls"));
            }
            Ok(StepResponse::Tool(ToolStep { calls }))
        }
        "final" => {
            if !calls.is_empty() {
                warn!(count = calls.len(), "Final step carried tool calls, ignoring them");
            }
            let answer = match obj.remove("answer") {
                Some(Value::String(answer)) => answer,
                Some(Value::Null) | None => return Err(violation("`final` step without answer")),
                Some(_) => return Err(violation("`answer` must be a string")),
            };
            let summary = match obj.remove("summary") {
                Some(Value::Null) | None => None,
                Some(value) => match StructuredSummary::from_value(value) {
                    Some(summary) => Some(summary),
                    None => {
                        warn!("Ignoring non-object summary");
                        None
                    }
                },
            };
            Ok(StepResponse::Final(FinalStep { answer, summary }))
        }
        other => Err(violation(format!("unknown step `{other}`"))),
    }
}

fn take_calls(obj: &mut Map<String, Value>) -> Result<Vec<ToolCall>, DecodeError> {
    let raw = ["toolCalls", "tool_calls"]
        .into_iter()
        .filter_map(|key| obj.remove(key))
        .find(|value| !value.is_null());

    match raw {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| parse_call(index, item))
            .collect(),
        Some(_) => Err(violation("`toolCalls` must be an array")),
    }
}

fn parse_call(index: usize, item: Value) -> Result<ToolCall, DecodeError> {
    let Value::Object(mut call) = item else {
        return Err(violation(format!("tool call #{index} is not an object")));
    };

    let name = match call.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Err(violation(format!("tool call #{index} has no name"))),
    };

    let arguments = normalize_arguments(&name, call.remove("arguments"))?;
    Ok(ToolCall { name, arguments })
}

fn normalize_arguments(name: &str, raw: Option<Value>) -> Result<Map<String, Value>, DecodeError> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(unwrap_schema(map)),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
            Ok(Value::Object(map)) => Ok(unwrap_schema(map)),
            _ => Err(violation(format!("arguments of `{name}` are not an object"))),
        },
        Some(_) => Err(violation(format!("arguments of `{name}` are not an object"))),
    }
}

/// Some models echo the tool's JSON Schema around the real values:
/// `{"type": "object", "properties": {"id": 7}}` → `{"id": 7}`.
fn unwrap_schema(map: Map<String, Value>) -> Map<String, Value> {
    let is_wrapper = map.get("type").and_then(Value::as_str) == Some("object")
        && map.get("properties").is_some_and(Value::is_object)
        && map
            .keys()
            .all(|k| matches!(k.as_str(), "type" | "properties" | "required"));

    if !is_wrapper {
        return map;
    }
    match map.into_iter().find(|(k, _)| k == "properties") {
        Some((_, Value::Object(properties))) => properties,
        _ => Map::new(),
    }
}
