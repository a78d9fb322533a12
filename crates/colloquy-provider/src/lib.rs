//! Chat-completion provider abstraction for colloquy.
//!
//! A single [`CompletionClient`] trait covers both message-shaping
//! conventions found in the wild: OpenAI-style APIs carry the system
//! instructions as a message inside the ordered list, Anthropic-style APIs
//! take them as a top-level parameter with the list starting at a user
//! turn. The provider is selected once at startup via [`ProviderKind`] and
//! never re-checked per call.

mod anthropic;
mod mock;
mod openai;
mod sse;
mod stream;
mod traits;

pub use anthropic::AnthropicClient;
pub use mock::{MockClient, MockReply};
pub use openai::OpenAiClient;
pub use stream::CompletionStream;
pub use traits::{ChatMessage, CompletionClient, ModelParams, ProviderError, ProviderKind, Role};

/// Create a client for the given provider, reading the API key from the
/// conventional environment variable (`OPENAI_API_KEY` / `ANTHROPIC_API_KEY`).
pub fn client_from_env(kind: ProviderKind) -> Result<Box<dyn CompletionClient>, ProviderError> {
    match kind {
        ProviderKind::OpenAi => Ok(Box::new(OpenAiClient::from_env()?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicClient::from_env()?)),
    }
}
