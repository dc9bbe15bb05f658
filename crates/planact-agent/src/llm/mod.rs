//! Chat-model integration layer.
//!
//! - [`model`] -- The [`ChatModel`] seam the planner talks to.
//! - [`types`] -- Provider-agnostic messages, requests, and responses.
//! - [`client`] -- HTTP client for the Anthropic and OpenAI APIs.

pub mod client;
pub mod model;
pub mod types;

pub use client::{DEFAULT_ANTHROPIC_MODEL, LlmClient, LlmClientConfig, LlmProvider};
pub use model::ChatModel;
pub use types::{ChatRequest, ChatResponse, LlmResponse, Message, Role, ToolCall};
