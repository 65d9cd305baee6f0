//! Error types for the AgentFlux domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout:?}")]
    Timeout { tool_name: String, timeout: Duration },
}

/// Errors that abort a run of the agent loop.
///
/// Tool failures never show up here; they are folded into the
/// conversation as failed tool results.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Turn {turn} timed out after {timeout:?}")]
    TurnTimeout { turn: u32, timeout: Duration },

    #[error("Maximum number of turns ({0}) exceeded")]
    MaxTurnsExceeded(u32),

    #[error("Run cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::Timeout {
            tool_name: "search".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Tool timed out: search after 30s");
    }

    #[test]
    fn sub_second_timeouts_keep_their_precision() {
        let err = ToolError::Timeout {
            tool_name: "search".into(),
            timeout: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "Tool timed out: search after 50ms");

        let err = AgentError::TurnTimeout {
            turn: 2,
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Turn 2 timed out after 1.5s");
    }

    #[test]
    fn agent_error_is_transparent_over_provider() {
        let err = AgentError::from(ProviderError::Network("connection reset".into()));
        assert_eq!(err.to_string(), "Network error: connection reset");
    }
}
