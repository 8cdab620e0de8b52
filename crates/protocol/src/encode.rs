//! Outcomes → feedback message, and steps → canonical wire form.

use serde::Serialize;
use stepwise_core::{StepResponse, StructuredSummary, ToolCall, ToolOutcome};

/// First line of every tool feedback message.
pub const FEEDBACK_HEADER: &str = "Tool execution results:";

/// Render one iteration's outcomes, in call order, as a single feedback text.
pub fn encode(outcomes: &[ToolOutcome]) -> String {
    let mut out = String::from(FEEDBACK_HEADER);
    for outcome in outcomes {
        out.push('\n');
        out.push_str("TOOL_RESULT ");
        out.push_str(outcome.tool_name());
        out.push_str(": ");
        out.push_str(&outcome.feedback_text());
    }
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireStep<'a> {
    step: &'static str,
    tool_calls: &'a [ToolCall],
    answer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a StructuredSummary>,
}

/// Serialize a step the way the model is asked to write it.
pub fn encode_step(step: &StepResponse) -> String {
    let wire = match step {
        StepResponse::Tool(tool) => WireStep {
            step: "tool",
            tool_calls: &tool.calls,
            answer: None,
            summary: None,
        },
        StepResponse::Final(fin) => WireStep {
            step: "final",
            tool_calls: &[],
            answer: Some(&fin.answer),
            summary: fin.summary.as_ref(),
        },
    };
    serde_json::to_string(&wire).unwrap_or_default()
}
