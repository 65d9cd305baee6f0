//! LLM provider implementations for AgentFlux.
//!
//! All providers implement the `agentflux_core::Provider` trait.

pub mod openai_compat;

use std::sync::Arc;

use agentflux_config::AppConfig;
use agentflux_core::error::ProviderError;
use agentflux_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// Fails with `NotConfigured` when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set AGENTFLUX_API_KEY or OPENROUTER_API_KEY, or api_key in config.toml"
                .into(),
        )
    })?;

    let name = if config.base_url.contains("openrouter.ai") {
        "openrouter"
    } else {
        "openai-compat"
    };

    tracing::debug!(provider = name, base_url = %config.base_url, "Building provider");
    Ok(Arc::new(OpenAiCompatProvider::new(name, &config.base_url, api_key)))
}
