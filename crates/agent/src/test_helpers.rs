//! Shared test doubles for loop tests.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use stepwise_core::{
    ModelClient, ModelError, ModelRequest, ModelResponse, Tool, ToolContext, ToolError, ToolSet,
    parse_arguments,
};

/// What the scripted model does on one call.
pub enum Turn {
    Reply(String),
    Fail(ModelError),
    Hang,
}

/// A model that plays back a script and records every request.
///
/// When the script runs out the last turn is repeated.
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Turn>>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Turn::Reply(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request);
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(Turn::Reply(text)) => {
                *self.last.lock().unwrap() = Some(text.clone());
                Ok(ModelResponse::text(text, "scripted-model"))
            }
            Some(Turn::Fail(err)) => Err(err),
            Some(Turn::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(ModelError::Network("woke up".into()))
            }
            None => {
                let last = self.last.lock().unwrap().clone();
                last.map(|text| ModelResponse::text(text, "scripted-model"))
                    .ok_or_else(|| ModelError::InvalidResponse("script exhausted".into()))
            }
        }
    }
}

pub fn tool_step(name: &str) -> String {
    format!(r#"{{"step":"tool","toolCalls":[{{"name":"{name}","arguments":{{}}}}],"answer":null}}"#)
}

pub fn final_step(answer: &str) -> String {
    format!(r#"{{"step":"final","toolCalls":[],"answer":"{answer}"}}"#)
}

/// Returns a fixed JSON value.
pub struct FixedTool {
    pub name: &'static str,
    pub output: Value,
}

#[async_trait]
impl Tool for FixedTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Returns a fixed value"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        Ok(self.output.clone())
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        Err(ToolError::failed("broken", "backend unavailable"))
    }
}

/// Panics when run.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        panic!("kaboom");
    }
}

#[derive(serde::Deserialize)]
struct NoteArgs {
    value: String,
}

/// Writes its argument into the tool context, yields, then reads it back.
pub struct NoteTool;

#[async_trait]
impl Tool for NoteTool {
    fn name(&self) -> &str {
        "note"
    }
    fn description(&self) -> &str {
        "Stores a value in the run context"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"value": {"type": "string"}}})
    }
    async fn execute(
        &self,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let args: NoteArgs = parse_arguments(self.name(), arguments)?;
        ctx.set("note", args.value);
        tokio::task::yield_now().await;
        Ok(ctx.get("note").unwrap_or(Value::Null))
    }
}

/// Sleeps for the given milliseconds, then echoes its name.
pub struct SlowTool {
    pub name: &'static str,
    pub delay_ms: u64,
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Sleeps, then answers"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(
        &self,
        _arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(Value::String(self.name.to_string()))
    }
}

pub fn tools(list: Vec<Box<dyn Tool>>) -> ToolSet {
    let mut set = ToolSet::new();
    for tool in list {
        set.register(tool);
    }
    set
}
