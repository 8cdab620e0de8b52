//! The orchestration loop implementation.

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_core::{
    DecodeError, FinalStep, Message, ModelClient, ModelError, ModelRequest, ModelResponse,
    StepResponse, ToolCall, ToolContext, ToolDescriptor, ToolOutcome, ToolRegistry,
};
use stepwise_protocol::{decode_with_report, encode};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::prompt::{PromptStrategy, StepProtocolPrompt};
use crate::result::{LoopError, LoopResult, TerminationReason};
use crate::sources::SourceCollector;

/// Model calls allowed per invocation unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// How long one model call may take.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    Deciding,
    ExecutingTools,
    Terminated(TerminationReason),
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::AwaitingModel => f.write_str("awaiting_model"),
            LoopState::Deciding => f.write_str("deciding"),
            LoopState::ExecutingTools => f.write_str("executing_tools"),
            LoopState::Terminated(reason) => write!(f, "terminated({reason})"),
        }
    }
}

/// Drives a model through tool calls until it answers or the budget runs out.
///
/// One `ToolLoop` can serve many concurrent invocations; all per-run state
/// lives inside [`ToolLoop::run_messages`].
pub struct ToolLoop {
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolRegistry>,
    prompt: Arc<dyn PromptStrategy>,
    model_name: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    model_timeout: Duration,
    format_reminders: u32,
    parallel_tools: bool,
    source_tools: HashSet<String>,
}

/// Mutable state of one invocation.
struct Run {
    ctx: ToolContext,
    messages: Vec<Message>,
    raw_tool_outputs: Vec<String>,
    sources: SourceCollector,
    iterations: u32,
    state: LoopState,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
}

impl Run {
    fn transition(&mut self, next: LoopState) {
        debug!(from = %self.state, to = %next, iteration = self.iterations, "Loop state change");
        self.state = next;
    }
}

impl ToolLoop {
    /// Create a loop with default settings and the step protocol prompt.
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<dyn ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            prompt: Arc::new(StepProtocolPrompt),
            model_name: String::new(),
            temperature: 0.2,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            format_reminders: 0,
            parallel_tools: false,
            source_tools: HashSet::new(),
        }
    }

    /// Model identifier sent with each request. Empty means the client's default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of model calls per invocation.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Answer up to `count` undecodable replies with a format reminder
    /// instead of terminating.
    pub fn with_format_reminders(mut self, count: u32) -> Self {
        self.format_reminders = count;
        self
    }

    /// Run one iteration's calls concurrently when the registry allows it.
    pub fn with_parallel_tools(mut self, enabled: bool) -> Self {
        self.parallel_tools = enabled;
        self
    }

    /// Tools whose outputs name the documents they came from.
    pub fn with_source_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_tools = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn PromptStrategy>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Build the opening messages from a request and preamble, then run.
    pub async fn run(
        &self,
        user_request: &str,
        system_preamble: &str,
    ) -> Result<LoopResult, LoopError> {
        let descriptors = self.tools.descriptors();
        let messages = vec![
            Message::system(self.prompt.system_prompt(system_preamble, &descriptors)),
            Message::user(self.prompt.user_message(user_request)),
        ];
        self.run_messages(messages).await
    }

    /// Run the loop over caller-supplied opening messages.
    ///
    /// Returns `Err` only when a model call fails. Every other ending,
    /// including an undecodable reply, is a [`LoopResult`].
    pub async fn run_messages(
        &self,
        initial_messages: Vec<Message>,
    ) -> Result<LoopResult, LoopError> {
        let ctx = ToolContext::new();
        let span = info_span!("tool_loop", run_id = %ctx.run_id());
        self.drive(ctx, initial_messages).instrument(span).await
    }

    async fn drive(
        &self,
        ctx: ToolContext,
        messages: Vec<Message>,
    ) -> Result<LoopResult, LoopError> {
        let descriptors = self.tools.descriptors();
        let mut run = Run {
            ctx,
            messages,
            raw_tool_outputs: Vec::new(),
            sources: SourceCollector::new(),
            iterations: 0,
            state: LoopState::AwaitingModel,
            started_at: Utc::now(),
            clock: Instant::now(),
        };
        let mut reminders_left = self.format_reminders;

        info!(
            model = %self.model.name(),
            tools = descriptors.len(),
            max_iterations = self.max_iterations,
            "Starting tool loop"
        );

        loop {
            if run.iterations >= self.max_iterations {
                warn!(iterations = run.iterations, "Iteration budget exhausted");
                let answer = format!(
                    "Stopped after {} model calls without a final answer. {} tool output(s) were collected.",
                    run.iterations,
                    run.raw_tool_outputs.len()
                );
                return Ok(self.finish(
                    run,
                    TerminationReason::IterationBudgetExceeded,
                    FinalStep::answer(answer),
                    None,
                ));
            }

            run.iterations += 1;
            let reply = self.call_model(&run, &descriptors).await?;
            run.transition(LoopState::Deciding);

            let decoded = match decode_with_report(&reply.content) {
                Ok(decoded) => decoded,
                Err(err) if reminders_left > 0 && run.iterations < self.max_iterations => {
                    reminders_left -= 1;
                    warn!(
                        error = %err,
                        reminders_left,
                        "Undecodable reply, sending format reminder"
                    );
                    run.messages.push(Message::assistant(reply.content));
                    run.messages.push(Message::user(self.prompt.format_reminder()));
                    run.transition(LoopState::AwaitingModel);
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "Undecodable reply, terminating");
                    let answer = format!("The model reply could not be understood: {err}");
                    return Ok(self.finish(
                        run,
                        TerminationReason::ProtocolFailure,
                        FinalStep::answer(answer),
                        Some(err),
                    ));
                }
            };

            if decoded.degraded {
                debug!("Reply was prose, using it as the final answer");
            }

            match decoded.step {
                StepResponse::Final(step) => {
                    return Ok(self.finish(run, TerminationReason::Completed, step, None));
                }
                StepResponse::Tool(step) => {
                    run.messages.push(Message::assistant(reply.content));
                    run.transition(LoopState::ExecutingTools);

                    let outcomes = self.execute_calls(&step.calls, &run.ctx).await;
                    for outcome in &outcomes {
                        if outcome.is_ok() && self.source_tools.contains(outcome.tool_name()) {
                            if let Some(payload) = outcome.payload() {
                                run.sources.scan(payload);
                            }
                        }
                        run.raw_tool_outputs.push(outcome.feedback_text());
                    }

                    run.messages.push(Message::user(encode(&outcomes)));
                    run.transition(LoopState::AwaitingModel);
                }
            }
        }
    }

    async fn call_model(
        &self,
        run: &Run,
        descriptors: &[ToolDescriptor],
    ) -> Result<ModelResponse, LoopError> {
        let iteration = run.iterations;
        debug!(iteration, messages = run.messages.len(), "Calling model");

        let mut request = ModelRequest::new(self.model_name.clone(), run.messages.clone());
        request.tools = descriptors.to_vec();
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let start = Instant::now();
        let reply = tokio::time::timeout(self.model_timeout, self.model.complete(request)).await;
        let result = match reply {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                timeout_secs: self.model_timeout.as_secs(),
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(reply) => {
                debug!(iteration, duration_ms, chars = reply.content.len(), "Model replied");
                Ok(reply)
            }
            Err(source) => {
                warn!(iteration, duration_ms, error = %source, "Model call failed");
                Err(LoopError::ModelCall { iteration, source })
            }
        }
    }

    /// Execute one iteration's calls. Outcomes are in request order.
    async fn execute_calls(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<ToolOutcome> {
        if self.parallel_tools && calls.len() > 1 && self.tools.supports_parallel() {
            debug!(count = calls.len(), "Executing tool calls concurrently");
            return join_all(calls.iter().map(|call| self.execute_call(call, ctx))).await;
        }

        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute_call(call, ctx).await);
        }
        outcomes
    }

    /// Run a single call; errors and panics become failed outcomes.
    async fn execute_call(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let start = Instant::now();
        let result = match AssertUnwindSafe(self.tools.execute(call, ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(format!("Tool panicked: {}", panic_message(panic.as_ref()))),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(payload) => {
                debug!(tool = %call.name, duration_ms, bytes = payload.len(), "Tool succeeded")
            }
            Err(error) => warn!(tool = %call.name, duration_ms, error = %error, "Tool failed"),
        }
        ToolOutcome::from_result(call.name.clone(), result)
    }

    fn finish(
        &self,
        mut run: Run,
        reason: TerminationReason,
        step: FinalStep,
        decode_error: Option<DecodeError>,
    ) -> LoopResult {
        run.transition(LoopState::Terminated(reason));
        let duration_ms = run.clock.elapsed().as_millis() as u64;
        info!(
            reason = %reason,
            iterations = run.iterations,
            tool_outputs = run.raw_tool_outputs.len(),
            duration_ms,
            "Tool loop finished"
        );

        LoopResult {
            run_id: run.ctx.run_id().to_string(),
            answer: step.answer,
            raw_tool_outputs: run.raw_tool_outputs,
            summary: step.summary,
            termination_reason: reason,
            iterations: run.iterations,
            started_at: run.started_at,
            duration_ms,
            sources: run.sources.into_names(),
            context: run.ctx.snapshot(),
            failure: decode_error.as_ref().map(ToString::to_string),
            decode_error,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One-shot convenience: default prompt, default settings, given budget.
pub async fn run(
    user_request: &str,
    system_preamble: &str,
    tools: Arc<dyn ToolRegistry>,
    model: Arc<dyn ModelClient>,
    max_iterations: u32,
) -> Result<LoopResult, LoopError> {
    ToolLoop::new(model, tools)
        .with_max_iterations(max_iterations)
        .run(user_request, system_preamble)
        .await
}
