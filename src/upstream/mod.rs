//! Outbound side: the OpenAI-compatible inference server.

mod client;
mod types;

pub use client::InferenceClient;
pub use types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ModelList, Role, TokenUsage,
};
