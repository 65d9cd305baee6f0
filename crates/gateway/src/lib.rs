//! HTTP API gateway for AgentFlux.
//!
//! Exposes chat management and streamed agent interactions over REST +
//! Server-Sent Events. Chats live in an in-process [`ChatStore`].
//!
//! Built on Axum.

pub mod api;
pub mod store;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use agentflux_agent::AgentLoop;
use agentflux_config::AppConfig;

pub use api::{ApiState, SharedApiState};
pub use store::{ChatStore, InMemoryChatStore};

/// Build the full router with CORS, body limit and trace layers applied.
///
/// An empty `allowed_origins` list allows any origin.
pub fn build_router(state: SharedApiState, allowed_origins: &[String]) -> Router {
    api::api_router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = agentflux_providers::build_from_config(&config)?;
    let tools = Arc::new(agentflux_tools::default_registry(&config.tools));
    info!(tools = tools.len(), "Tools registered");

    let state = Arc::new(ApiState {
        agent: AgentLoop::from_config(provider, tools, &config),
        store: Arc::new(InMemoryChatStore::new()),
    });

    let app = build_router(state, &config.gateway.allowed_origins);

    info!(addr = %addr, model = %config.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
