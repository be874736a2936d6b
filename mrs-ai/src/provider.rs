//! Provider abstraction
//!
//! Callers build a [`CompletionRequest`] and hand it to any
//! [`CompletionProvider`]. Providers translate it to their wire format.

use crate::AiError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Incremental text deltas from a streaming completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AiError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Named JSON schema the model output must satisfy
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Provider model identifier; empty selects the provider default
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Force the provider's web search tool
    pub web_search: bool,
    pub output: Option<OutputSchema>,
    pub max_tokens: u32,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            system: None,
            messages: Vec::new(),
            temperature: 0.7,
            web_search: false,
            output: None,
            max_tokens: 4096,
        }
    }
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn json_output(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.output = Some(OutputSchema {
            name: name.into(),
            schema,
        });
        self
    }
}

/// An LLM vendor
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Vendor name for logs
    fn name(&self) -> &'static str;

    /// Run a completion to the end and return its text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;

    /// Start a completion and return its text deltas as they arrive
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, AiError>;
}
