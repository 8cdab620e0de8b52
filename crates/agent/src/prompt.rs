//! Prompt strategies: how the caller's preamble, the tool catalogue and the
//! protocol contract become messages.

use serde_json::json;
use stepwise_core::{FinalStep, StepResponse, ToolCall, ToolDescriptor, ToolStep};
use stepwise_protocol::encode_step;

/// Produces the text of the messages the loop itself authors.
pub trait PromptStrategy: Send + Sync {
    /// The system message for a run.
    fn system_prompt(&self, preamble: &str, tools: &[ToolDescriptor]) -> String;

    /// The first user message for a run.
    fn user_message(&self, request: &str) -> String {
        request.to_string()
    }

    /// Sent after a reply that could not be decoded.
    fn format_reminder(&self) -> String;
}

/// Appends the step protocol contract and the tool catalogue to the preamble.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProtocolPrompt;

impl StepProtocolPrompt {
    fn tool_example() -> String {
        encode_step(&StepResponse::Tool(ToolStep {
            calls: vec![ToolCall::new("tool_name", json!({"argument": "value"}))],
        }))
    }

    fn final_example() -> String {
        encode_step(&StepResponse::Final(FinalStep::answer("Your answer to the user.")))
    }
}

impl PromptStrategy for StepProtocolPrompt {
    fn system_prompt(&self, preamble: &str, tools: &[ToolDescriptor]) -> String {
        let mut prompt = String::new();
        if !preamble.trim().is_empty() {
            prompt.push_str(preamble.trim_end());
            prompt.push_str("\n\n");
        }

        prompt.push_str("## Response format\n");
        prompt.push_str("Reply with exactly one JSON object and nothing else.\n");
        prompt.push_str("To call tools:\n");
        prompt.push_str(&Self::tool_example());
        prompt.push_str("\nWhen you are done:\n");
        prompt.push_str(&Self::final_example());
        prompt.push_str("\nA final step may also carry a \"summary\" object.\n");

        if tools.is_empty() {
            prompt.push_str("\nNo tools are available; answer with a final step.\n");
            return prompt;
        }

        prompt.push_str("\n## Tools\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            prompt.push_str(&format!("  arguments: {}\n", tool.argument_schema));
        }
        prompt
    }

    fn format_reminder(&self) -> String {
        format!(
            "Your last reply was not a valid step. Reply with one JSON object only, for example:\n{}",
            Self::final_example()
        )
    }
}
