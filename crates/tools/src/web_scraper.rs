//! Page content extraction via the Tavily extract API.

use agentflux_core::error::ToolError;
use agentflux_core::tool::{Tool, parse_arguments};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::tavily::TavilyClient;

pub struct WebScraperTool {
    client: TavilyClient,
}

#[derive(Debug, Deserialize)]
struct WebScraperInput {
    url: String,
}

impl WebScraperTool {
    pub fn new(client: TavilyClient) -> Self {
        Self { client }
    }
}

/// Accept only absolute http(s) URLs.
fn validate_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ToolError::InvalidArguments(format!("invalid url '{raw}': {e}")))?;
    if matches!(url.scheme(), "http" | "https") && url.host().is_some() {
        Ok(url)
    } else {
        Err(ToolError::InvalidArguments(format!(
            "url must be http or https with a host, got '{url}'"
        )))
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn name(&self) -> &str {
        "web_scraper"
    }

    fn description(&self) -> &str {
        "A tool to scrape content from a given URL."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "format": "uri",
                    "description": "The URL to scrape content from"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, _call_id: &str, arguments: &str) -> Result<String, ToolError> {
        let input: WebScraperInput = parse_arguments(arguments)?;
        let url = validate_url(&input.url)?;

        let results = self.client.extract(self.name(), &[url.as_str()]).await?;
        serde_json::to_string_pretty(&results).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tavily::mock;

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.com/page").is_ok());
        assert!(validate_url("http://localhost:8080").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("").is_err());
    }

    #[tokio::test]
    async fn invalid_url_rejected_before_request() {
        let tool = WebScraperTool::new(TavilyClient::with_base_url("http://127.0.0.1:9", "k"));
        let result = tool.execute("c1", r#"{"url":"not a url"}"#).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn extract_returns_pretty_json() {
        let base_url = mock::serve().await;
        let tool = WebScraperTool::new(TavilyClient::with_base_url(base_url, "tvly-test"));

        let output = tool
            .execute("c1", r#"{"url":"https://example.com/a"}"#)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["results"][0]["url"], "https://example.com/a");
        assert_eq!(value["results"][0]["raw_content"], "page text");
    }
}
