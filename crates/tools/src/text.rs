//! Text utilities.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use stepwise_core::{Tool, ToolContext, ToolError, parse_arguments};

pub struct ReverseStringTool;

#[derive(Deserialize)]
struct ReverseArgs {
    text: String,
}

#[async_trait]
impl Tool for ReverseStringTool {
    fn name(&self) -> &str {
        "reverse_string"
    }

    fn description(&self) -> &str {
        "Reverse a string character by character."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The text to reverse" }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let args: ReverseArgs = parse_arguments(self.name(), arguments)?;
        Ok(Value::String(args.text.chars().rev().collect()))
    }
}
