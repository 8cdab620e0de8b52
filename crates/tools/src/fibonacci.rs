//! Fibonacci numbers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use stepwise_core::{Tool, ToolContext, ToolError, parse_arguments};

/// Largest index whose Fibonacci number fits in a `u64`.
pub const MAX_INDEX: u32 = 93;

pub struct FibonacciTool;

#[derive(Deserialize)]
struct FibonacciArgs {
    n: u32,
}

#[async_trait]
impl Tool for FibonacciTool {
    fn name(&self) -> &str {
        "calculate_fibonacci"
    }

    fn description(&self) -> &str {
        "Return the n-th Fibonacci number (F(0) = 0, F(1) = 1)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "n": { "type": "integer", "minimum": 0, "maximum": MAX_INDEX }
            },
            "required": ["n"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let args: FibonacciArgs = parse_arguments(self.name(), arguments)?;
        let value = fibonacci(args.n).ok_or_else(|| ToolError::InvalidArguments {
            tool_name: self.name().to_string(),
            reason: format!("n must be at most {MAX_INDEX}, got {}", args.n),
        })?;
        Ok(json!(value))
    }
}

/// `None` once the result overflows a `u64`.
pub fn fibonacci(n: u32) -> Option<u64> {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(a)
}
