//! # MRS AI Library
//!
//! AI completion layer for the market research service:
//! - [`provider::CompletionProvider`] abstraction with OpenAI (Responses API)
//!   and Anthropic (Messages API) clients, both blocking and streaming
//! - Prompt catalogue and context builders
//! - Structured response schemas (company profile, topics, queries)
//! - Repair of malformed unicode escapes emitted by models

pub mod anthropic;
pub mod decode;
pub mod error;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod schemas;
pub mod sectors;
mod sse;

pub use error::AiError;
pub use provider::{ChatMessage, CompletionProvider, CompletionRequest, Role, TextStream};
