//! # AgentFlux Core
//!
//! Domain types, traits, and error definitions for the AgentFlux
//! tool-calling agent. This crate has **no framework dependencies** — it
//! defines the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external capabilities the agent loop consumes — model
//! completion ([`Provider`]) and tool execution ([`Tool`]) — are traits
//! defined here. Implementations live in their own crates. This enables:
//! - Swapping the completion backend via configuration
//! - Testing the loop with scripted providers and tools
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, ProviderError, ToolError};
pub use event::AgentEvent;
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StreamDelta, ToolCallFragment, ToolDefinition,
};
pub use tool::{Tool, ToolCall, ToolOutcome, ToolRegistry};
