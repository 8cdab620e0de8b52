//! Invocation notes: scratch values the model can carry between steps.
//!
//! Notes live in the [`ToolContext`] of the current run and disappear with it.
//! The final context snapshot is reported on the loop result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use stepwise_core::{Tool, ToolContext, ToolError, parse_arguments};
use tracing::debug;

pub struct RememberTool;

pub struct RecallTool;

#[derive(Deserialize)]
struct RememberArgs {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct RecallArgs {
    key: String,
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Store a value under a key for the rest of this request."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string" },
                "value": { "description": "Any JSON value" }
            },
            "required": ["key", "value"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let args: RememberArgs = parse_arguments(self.name(), arguments)?;
        if args.key.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool_name: self.name().to_string(),
                reason: "key must not be empty".into(),
            });
        }
        debug!(run_id = %ctx.run_id(), key = %args.key, "Storing note");
        let replaced = ctx.set(args.key.clone(), args.value).is_some();
        Ok(json!({ "stored": args.key, "replaced": replaced }))
    }
}

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Read a value previously stored with `remember`."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string" }
            },
            "required": ["key"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let args: RecallArgs = parse_arguments(self.name(), arguments)?;
        ctx.get(&args.key).ok_or_else(|| {
            ToolError::failed(self.name(), format!("nothing stored under `{}`", args.key))
        })
    }
}
