use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::CompletionStream;

/// Errors from a completion provider. Fatal to the current turn only; the
/// session itself survives and the caller may retry.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider authentication not configured: {0}")]
    Auth(String),

    #[error("Request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Mock script exhausted")]
    ScriptExhausted,
}

/// Message role in the ordered conversation sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in the ordered sequence sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Model parameters for a single completion call.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl ModelParams {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" | "gpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Uniform access to a streaming chat-completion call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Human-readable provider name (e.g., "OpenAI", "Anthropic").
    fn name(&self) -> &str;

    /// Request a completion and return the final text in one piece.
    /// Used for non-interactive calls such as summary generation.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
    ) -> Result<String, ProviderError>;

    /// Request a completion as a lazy, finite sequence of text fragments.
    /// Exactly one stream per requested turn; dropping the stream stops
    /// consumption of any remaining fragments.
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
    ) -> Result<CompletionStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_from_str() {
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("Claude".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = ChatMessage::new(Role::System, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
    }
}
