//! Minimal Tavily API client shared by `search` and `web_scraper`.

use agentflux_core::error::ToolError;
use tracing::debug;

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

#[derive(Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(TAVILY_BASE_URL, api_key)
    }

    /// Point the client at a different host (self-hosted proxy, tests).
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// `POST /search`
    pub async fn search(
        &self,
        tool_name: &str,
        query: &str,
        max_results: u32,
    ) -> Result<serde_json::Value, ToolError> {
        let body = serde_json::json!({
            "query": query,
            "max_results": max_results,
        });
        self.post(tool_name, "search", &body).await
    }

    /// `POST /extract`
    pub async fn extract(
        &self,
        tool_name: &str,
        urls: &[&str],
    ) -> Result<serde_json::Value, ToolError> {
        let body = serde_json::json!({ "urls": urls });
        self.post(tool_name, "extract", &body).await
    }

    async fn post(
        &self,
        tool_name: &str,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(tool = tool_name, url = %url, "Calling Tavily");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("Tavily returned {}: {text}", status.as_u16())));
        }

        response
            .json()
            .await
            .map_err(|e| failed(format!("invalid Tavily response: {e}")))
    }
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
