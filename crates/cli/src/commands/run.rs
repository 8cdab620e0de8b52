//! `stepwise run`: answer one request through the tool loop.

use clap::Args;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stepwise_agent::{LoopResult, TerminationReason, ToolLoop, extract_digest};
use stepwise_config::AppConfig;
use stepwise_core::FinalStep;
use tracing::debug;

const DEFAULT_PREAMBLE: &str = "You are a careful assistant. Use the available tools whenever \
they help, and answer only from what they return.";

#[derive(Args)]
pub struct RunArgs {
    /// The request to answer; `-` reads it from stdin
    pub request: String,

    /// System preamble placed before the response-format instructions
    #[arg(short, long)]
    pub preamble: Option<String>,

    /// Override the model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override agent.max_iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Print the whole result as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with an error when the reply could not be decoded
    #[arg(long)]
    pub strict: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let request = if args.request == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        args.request.clone()
    };
    if request.trim().is_empty() {
        return Err("The request is empty.".into());
    }

    let client = stepwise_providers::build_from_config(&config)?;
    let tools = Arc::new(stepwise_tools::default_registry());
    let tool_loop = build_loop(&config, &args, client, tools);

    let preamble = args
        .preamble
        .as_deref()
        .or(config.agent.system_preamble.as_deref())
        .unwrap_or(DEFAULT_PREAMBLE);

    let result = tool_loop.run(&request, preamble).await?;
    debug!(
        iterations = result.iterations,
        reason = %result.termination_reason,
        "Run finished"
    );
    let result = if args.strict { result.into_result()? } else { result };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result)?;
    }
    Ok(())
}

fn build_loop(
    config: &AppConfig,
    args: &RunArgs,
    client: Arc<dyn stepwise_core::ModelClient>,
    tools: Arc<dyn stepwise_core::ToolRegistry>,
) -> ToolLoop {
    let agent = &config.agent;
    let max_iterations = args.max_iterations.unwrap_or(agent.max_iterations);
    debug!(
        provider = %config.default_provider,
        model = args.model.as_deref().unwrap_or(&config.default_model),
        max_iterations,
        "Building tool loop"
    );
    let mut tool_loop = ToolLoop::new(client, tools)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(max_iterations)
        .with_model_timeout(Duration::from_secs(agent.model_timeout_secs))
        .with_format_reminders(agent.format_reminders)
        .with_parallel_tools(agent.parallel_tools)
        .with_source_tools(agent.source_tools.iter().cloned());
    if let Some(model) = &args.model {
        tool_loop = tool_loop.with_model(model.clone());
    }
    tool_loop
}

fn print_result(result: &LoopResult) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", result.answer_with_sources());

    if let Some(summary) = &result.summary {
        let step = FinalStep {
            answer: result.answer.clone(),
            summary: Some(summary.clone()),
        };
        println!();
        match extract_digest(&step) {
            Some(digest) if !digest.title.is_empty() => println!("{}", digest.to_markdown()),
            _ => println!("{}", serde_json::to_string_pretty(summary)?),
        }
    }

    if result.termination_reason != TerminationReason::Completed {
        eprintln!();
        eprintln!(
            "  [{}] after {} model call(s), {} tool output(s)",
            result.termination_reason,
            result.iterations,
            result.raw_tool_outputs.len()
        );
        if let Some(failure) = &result.failure {
            eprintln!("  {failure}");
        }
    }
    Ok(())
}
