//! `agentflux config` — Show the effective configuration.

use agentflux_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", config.redacted_toml());

    if !config.has_api_key() {
        println!("# warning: no API key set (AGENTFLUX_API_KEY or OPENROUTER_API_KEY)");
    }
    if config.tools.tavily_api_key.is_none() {
        println!("# warning: no Tavily key set; search and web_scraper are disabled");
    }

    Ok(())
}
