//! `agentflux tools` — List enabled tools with their parameter schemas.

use agentflux_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = agentflux_tools::default_registry(&config.tools);

    if registry.is_empty() {
        println!("No tools enabled.");
        println!("  Set TAVILY_API_KEY for search and web_scraper,");
        println!("  or tools.enable_code_interpret = true for code_interpret.");
        return Ok(());
    }

    for definition in registry.definitions() {
        println!("{}", definition.name);
        println!("  {}", definition.description);
        println!(
            "  {}",
            serde_json::to_string_pretty(&definition.parameters)?.replace('\n', "\n  ")
        );
        println!();
    }

    Ok(())
}
