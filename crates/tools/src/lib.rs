//! Built-in tool implementations for AgentFlux.
//!
//! - `search` and `web_scraper` call the Tavily API and need
//!   `tools.tavily_api_key` (or `TAVILY_API_KEY`).
//! - `code_interpret` runs Python on the host and must be enabled with
//!   `tools.enable_code_interpret = true`.

pub mod code_interpret;
pub mod search;
pub mod tavily;
pub mod web_scraper;

use std::sync::Arc;

use agentflux_config::ToolsConfig;
use agentflux_core::tool::ToolRegistry;

pub use code_interpret::CodeInterpretTool;
pub use search::SearchTool;
pub use tavily::TavilyClient;
pub use web_scraper::WebScraperTool;

/// Create a tool registry with every built-in tool the config enables.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    match &config.tavily_api_key {
        Some(key) => {
            let client = TavilyClient::new(key.clone());
            registry.register(Arc::new(SearchTool::new(
                client.clone(),
                config.search_max_results,
            )));
            registry.register(Arc::new(WebScraperTool::new(client)));
        }
        None => tracing::info!("No Tavily API key configured; search and web_scraper disabled"),
    }

    if config.enable_code_interpret {
        registry.register(Arc::new(CodeInterpretTool::new(config.python_bin.clone())));
    }

    registry
}
