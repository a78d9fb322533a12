use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::stream::CompletionStream;
use crate::traits::{ChatMessage, CompletionClient, ModelParams, ProviderError};

/// One scripted provider response.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these fragments in order, then end the stream.
    Fragments(Vec<String>),
    /// A single-piece response (one fragment when streamed).
    Text(String),
    /// Fail the call with an API error.
    Fail(String),
}

/// Scripted provider for tests: replies are consumed in call order, and
/// every received message sequence is recorded for assertions.
#[derive(Default)]
pub struct MockClient {
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply::Text(text.into()))
    }

    pub fn with_fragments(self, fragments: &[&str]) -> Self {
        self.with_reply(MockReply::Fragments(
            fragments.iter().map(|s| s.to_string()).collect(),
        ))
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.with_reply(MockReply::Fail(message.into()))
    }

    /// Message sequences received so far, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> Result<MockReply, ProviderError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ProviderError::ScriptExhausted)
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &ModelParams,
    ) -> Result<String, ProviderError> {
        match self.next_reply(messages)? {
            MockReply::Text(text) => Ok(text),
            MockReply::Fragments(fragments) => Ok(fragments.concat()),
            MockReply::Fail(message) => Err(ProviderError::Api {
                status: 503,
                body: message,
            }),
        }
    }

    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        _params: &ModelParams,
    ) -> Result<CompletionStream, ProviderError> {
        match self.next_reply(messages)? {
            MockReply::Text(text) => Ok(CompletionStream::from_fragments(vec![text])),
            MockReply::Fragments(fragments) => Ok(CompletionStream::from_fragments(fragments)),
            MockReply::Fail(message) => Err(ProviderError::Api {
                status: 503,
                body: message,
            }),
        }
    }
}
