//! What a loop invocation hands back to its caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use stepwise_core::{DecodeError, ModelError, StructuredSummary};
use thiserror::Error;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model produced a final step.
    Completed,
    /// `max_iterations` model calls were made without a final step.
    IterationBudgetExceeded,
    /// A model reply could not be decoded.
    ProtocolFailure,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TerminationReason::Completed => "completed",
            TerminationReason::IterationBudgetExceeded => "iteration_budget_exceeded",
            TerminationReason::ProtocolFailure => "protocol_failure",
        };
        f.write_str(label)
    }
}

/// The immutable outcome of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct LoopResult {
    /// Identifier of the invocation, also recorded on every log line.
    pub run_id: String,
    pub answer: String,
    /// Every tool payload in execution order; failures appear as `ERROR: <message>`.
    pub raw_tool_outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StructuredSummary>,
    pub termination_reason: TerminationReason,
    /// Model calls made.
    pub iterations: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Document names reported by source tools, first-seen order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Final contents of the per-invocation tool context.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    /// The decode error when the reason is [`TerminationReason::ProtocolFailure`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip)]
    pub(crate) decode_error: Option<DecodeError>,
}

impl LoopResult {
    pub fn is_completed(&self) -> bool {
        self.termination_reason == TerminationReason::Completed
    }

    /// Turn a protocol failure into a hard error; other results pass through.
    pub fn into_result(self) -> Result<LoopResult, LoopError> {
        if self.termination_reason != TerminationReason::ProtocolFailure {
            return Ok(self);
        }
        let source = self.decode_error.unwrap_or_else(|| {
            DecodeError::Unrecoverable(self.failure.unwrap_or_default())
        });
        Err(LoopError::Protocol {
            iteration: self.iterations,
            source,
        })
    }

    /// The answer followed by a numbered list of the collected sources.
    pub fn answer_with_sources(&self) -> String {
        if self.sources.is_empty() {
            return self.answer.clone();
        }

        let mut out = self.answer.clone();
        out.push_str("\n\n---\n\n**Sources:**\n");
        for (i, source) in self.sources.iter().enumerate() {
            out.push_str(&format!("{}. `{}`\n", i + 1, source));
        }
        out
    }
}

/// Errors returned by the loop itself.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Transport, provider or timeout failure. Never retried.
    #[error("Model call failed at iteration {iteration}: {source}")]
    ModelCall { iteration: u32, source: ModelError },

    /// Only produced by [`LoopResult::into_result`].
    #[error("Model reply could not be decoded at iteration {iteration}: {source}")]
    Protocol { iteration: u32, source: DecodeError },
}
