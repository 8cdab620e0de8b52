//! `stepwise config`: Configuration management commands.

use std::path::{Path, PathBuf};
use stepwise_config::AppConfig;

fn resolve(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(AppConfig::config_path)
}

pub async fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

pub async fn init(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = resolve(path);
    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run `stepwise config init`.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created {}", config_path.display());
    println!("Next: add an API key (or export STEPWISE_API_KEY), then run `stepwise run \"...\"`.");
    Ok(())
}

pub async fn path(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", resolve(path).display());
    Ok(())
}

pub async fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match super::load_config(path) {
        Ok(config) => config,
        Err(e) => {
            println!("Config error: {e}");
            return Err(e.into());
        }
    };

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("Config OK");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }

    println!();
    println!("  Provider:        {}", config.default_provider);
    println!("  Model:           {}", config.default_model);
    println!("  Max iterations:  {}", config.agent.max_iterations);
    println!("  Model timeout:   {}s", config.agent.model_timeout_secs);
    Ok(())
}

fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if stepwise_providers::build_from_config(config).is_err() {
        warnings.push(format!(
            "provider `{}` is not usable as configured (missing API key or api_url)",
            config.default_provider
        ));
    }
    if config.agent.parallel_tools {
        warnings.push(
            "parallel_tools has no effect with the built-in tools, which share the run context"
                .to_string(),
        );
    }
    warnings
}
