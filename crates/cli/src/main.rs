//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`      Answer a request through the tool loop
//! - `decode`   Decode (and repair) a raw model reply
//! - `tools`    List the built-in tools
//! - `config`   Show, create or validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stepwise_config::LogConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise — a bounded, self-repairing tool-calling loop",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.stepwise/config.toml
    #[arg(long, global = true, env = "STEPWISE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a request using the configured model and the built-in tools
    Run(commands::run::RunArgs),

    /// Decode a raw model reply from a file or stdin
    Decode {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,

        /// Only run the repair pipeline and print the repaired text
        #[arg(long)]
        repair_only: bool,
    },

    /// List the built-in tools
    Tools {
        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (keys redacted)
    Show,
    /// Write a default config file if none exists
    Init,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A broken config file is reported by the command that needs it.
    let log = commands::load_config(cli.config.as_deref())
        .map(|c| c.log)
        .unwrap_or_default();
    init_tracing(cli.verbose, &log);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => commands::run::run(config_path, args).await?,
        Commands::Decode { file, repair_only } => {
            commands::decode::run(file.as_deref(), repair_only).await?
        }
        Commands::Tools { json } => commands::tools::run(json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Init => commands::config_cmd::init(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
        },
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` or the configured level.
fn init_tracing(verbose: bool, log: &LogConfig) {
    let level = if verbose { "debug" } else { log.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
