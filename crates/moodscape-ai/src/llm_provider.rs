use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for LLM operations
pub type LLMResult<T> = Result<T, ProviderError>;

/// Failure modes of a chat completion call. The display text is shown to
/// chat users as the assistant's error message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("GROQ_API_KEY is not configured on the server.")]
    NotConfigured,

    #[error("No messages provided to generate a response.")]
    EmptyConversation,

    #[error("Model returned an empty response.")]
    EmptyResponse,

    #[error("Authentication with Groq API failed. Check GROQ_API_KEY.")]
    Authentication,

    #[error("AI request failed: {message}")]
    Api { status: u16, message: String },

    #[error("AI request failed: {0}")]
    Transport(String),

    #[error("AI request failed: invalid response ({0})")]
    InvalidResponse(String),

    #[error("AI request failed after {attempts} attempts.")]
    RetriesExhausted { attempts: u32 },
}

impl ProviderError {
    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Api { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}

/// Configuration for generation parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Ask for `response_format: json_object`
    pub json_response: bool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text content
    pub content: String,
    /// Model used for generation
    pub model: String,
    pub finish_reason: Option<String>,
    pub total_tokens: Option<usize>,
}

/// Chat completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}
