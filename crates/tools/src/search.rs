//! Web search tool backed by the Tavily search API.

use agentflux_core::error::ToolError;
use agentflux_core::tool::{Tool, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;

use crate::tavily::TavilyClient;

pub struct SearchTool {
    client: TavilyClient,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

impl SearchTool {
    pub fn new(client: TavilyClient, max_results: u32) -> Self {
        Self {
            client,
            max_results,
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "A tool searches the web for a given query and returns relevant results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query string",
                    "minLength": 1
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _call_id: &str, arguments: &str) -> Result<String, ToolError> {
        let input: SearchInput = parse_arguments(arguments)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'query' must not be empty".into()));
        }

        let results = self
            .client
            .search(self.name(), &input.query, self.max_results)
            .await?;
        serde_json::to_string_pretty(&results).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}
