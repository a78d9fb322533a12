use std::sync::Arc;

use tracing::debug;

use colloquy_provider::{ChatMessage, CompletionClient, ModelParams, Role};

use crate::NotifyError;

const SUMMARY_INSTRUCTIONS: &str = "You are given the transcript of a structured interview. \
     Write a concise summary of the respondent's answers in third person: \
     the main themes discussed, concrete examples they gave, and any points \
     they flagged as open or unresolved. Do not quote termination codes or \
     system text. Keep it under 300 words.";

/// Generates the post-interview summary with a single non-streamed
/// completion call.
pub struct Summarizer {
    client: Arc<dyn CompletionClient>,
    params: ModelParams,
}

impl Summarizer {
    pub fn new(client: Arc<dyn CompletionClient>, params: ModelParams) -> Self {
        Self { client, params }
    }

    pub async fn summarize(&self, transcript: &str) -> Result<String, NotifyError> {
        debug!(transcript_chars = transcript.len(), "Generating summary");
        let messages = vec![
            ChatMessage::new(Role::System, SUMMARY_INSTRUCTIONS),
            ChatMessage::new(Role::User, transcript),
        ];
        let summary = self.client.complete(&messages, &self.params).await?;
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_provider::MockClient;

    #[tokio::test]
    async fn sends_transcript_as_user_message() {
        let client = Arc::new(MockClient::new().with_text("  A tidy summary.  "));
        let summarizer = Summarizer::new(client.clone(), ModelParams::new("mock", 512));

        let summary = summarizer.summarize("Interviewer: Hello!").await.unwrap();
        assert_eq!(summary, "A tidy summary.");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, Role::System);
        assert_eq!(requests[0][1].role, Role::User);
        assert_eq!(requests[0][1].content, "Interviewer: Hello!");
    }

    #[tokio::test]
    async fn provider_failure_maps_to_notify_error() {
        let client = Arc::new(MockClient::new().with_failure("rate limited"));
        let summarizer = Summarizer::new(client, ModelParams::new("mock", 512));
        let result = summarizer.summarize("t").await;
        assert!(matches!(result, Err(NotifyError::Summary(_))));
    }
}
