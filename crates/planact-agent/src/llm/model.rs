//! The chat-model seam.
//!
//! The planner only needs one capability from a language model: take an
//! ordered list of role-tagged messages and return text.  Anything that can
//! do that (the HTTP [`LlmClient`](super::LlmClient), a local model, a
//! scripted stand-in in tests) implements [`ChatModel`].

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{ChatResponse, Message};

/// An asynchronous chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `messages` to the model and await its reply.
    ///
    /// Errors are transport or provider failures; callers propagate them.
    async fn invoke(&self, messages: &[Message]) -> Result<ChatResponse>;
}
