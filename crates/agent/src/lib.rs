//! The Stepwise orchestration loop.
//!
//! Each invocation follows one cycle:
//!
//! 1. **Ask** the model, sending the full message history and tool catalogue
//! 2. **Decode** the reply into a step (tolerating near-JSON and prose)
//! 3. **If tool step**: run every call, feed the outcomes back, go to 1
//! 4. **If final step**: return the answer, summary and all tool outputs
//!
//! Termination is guaranteed: at most `max_iterations` model calls are made.
//! Tool failures and panics never end a run; model call failures do.

pub mod extract;
pub mod loop_runner;
pub mod prompt;
pub mod result;
pub mod sources;

#[cfg(test)]
mod test_helpers;

pub use extract::{DigestItem, Priority, TaskDigest, extract, extract_digest};
pub use loop_runner::{DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL_TIMEOUT, LoopState, ToolLoop, run};
pub use prompt::{PromptStrategy, StepProtocolPrompt};
pub use result::{LoopError, LoopResult, TerminationReason};
pub use sources::SourceCollector;
