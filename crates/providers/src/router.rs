//! Client construction from configuration.

use std::sync::Arc;
use stepwise_config::AppConfig;
use stepwise_core::{ModelClient, ModelError};
use tracing::info;

use crate::openai_compat::OpenAiCompatClient;

/// Build the model client for `config.default_provider`.
///
/// `[providers.<name>]` may override the endpoint, key and model. Hosted
/// providers need an API key; local runtimes do not.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelClient>, ModelError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ModelError::NotConfigured(format!(
                "unknown provider `{name}`; set providers.{name}.api_url"
            ))
        })?;

    let api_key = match config.api_key_for(name) {
        Some(key) => key.to_string(),
        None if is_local(name) => name.to_string(),
        None => {
            return Err(ModelError::NotConfigured(format!(
                "no API key for `{name}`; set STEPWISE_API_KEY or api_key in config.toml"
            )));
        }
    };

    let model = provider_config
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());

    info!(provider = %name, base_url = %base_url, model = %model, "Model client configured");
    Ok(Arc::new(
        OpenAiCompatClient::new(name, base_url, api_key).with_default_model(model),
    ))
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
