use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::sse::SseDecoder;
use crate::stream::CompletionStream;
use crate::traits::{ChatMessage, CompletionClient, ModelParams, ProviderError, Role};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the Anthropic Messages API.
///
/// Unlike OpenAI-compatible APIs, system instructions go in a top-level
/// `system` parameter and the message list must start at a `user` role, so
/// leading system messages are lifted out of the ordered list here.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read the API key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ProviderError::Auth("ANTHROPIC_API_KEY not set".to_string()))?;
        Self::new(key)
    }

    fn request_body(messages: &[ChatMessage], params: &ModelParams, stream: bool) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let msgs: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": msgs,
            "stream": stream,
        });
        let obj = body.as_object_mut().expect("body is an object");
        if !system.is_empty() {
            obj.insert("system".into(), json!(system.join("\n\n")));
        }
        if let Some(temperature) = params.temperature {
            obj.insert("temperature".into(), json!(temperature));
        }
        body
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %params.model, stream, "Requesting Anthropic completion");

        let resp = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&Self::request_body(messages, params, stream))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
    ) -> Result<String, ProviderError> {
        let resp = self.send(messages, params, false).await?;
        let v: Value = resp.json().await?;
        let content = v
            .pointer("/content/0/text")
            .and_then(|x| x.as_str())
            .ok_or_else(|| ProviderError::Malformed("missing content[0].text".to_string()))?;
        Ok(content.to_string())
    }

    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
    ) -> Result<CompletionStream, ProviderError> {
        let resp = self.send(messages, params, true).await?;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut bytes = resp.bytes_stream();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::Transport(e))).await;
                        return;
                    }
                };
                for payload in decoder.push(&chunk) {
                    let Ok(event) = serde_json::from_str::<Value>(&payload) else {
                        continue;
                    };
                    match event.get("type").and_then(|t| t.as_str()) {
                        Some("content_block_delta") => {
                            let fragment = event
                                .pointer("/delta/text")
                                .and_then(|x| x.as_str())
                                .map(str::to_string);
                            if let Some(fragment) = fragment {
                                if !fragment.is_empty() && tx.send(Ok(fragment)).await.is_err() {
                                    return; // consumer aborted
                                }
                            }
                        }
                        Some("message_stop") => return,
                        _ => {}
                    }
                }
            }
        });

        Ok(CompletionStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_text_lifted_to_top_level_parameter() {
        let messages = vec![
            ChatMessage::new(Role::System, "interview outline"),
            ChatMessage::new(Role::User, "Hi"),
            ChatMessage::new(Role::Assistant, "Hello!"),
        ];
        let params = ModelParams::new("claude-3-5-sonnet-latest", 2048);
        let body = AnthropicClient::request_body(&messages, &params, false);

        assert_eq!(body["system"], "interview outline");
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[1]["role"], "assistant");
    }

    #[test]
    fn no_system_parameter_without_system_message() {
        let messages = vec![ChatMessage::new(Role::User, "Hi")];
        let params = ModelParams::new("claude-3-5-sonnet-latest", 2048);
        let body = AnthropicClient::request_body(&messages, &params, true);
        assert!(body.get("system").is_none());
        assert_eq!(body["stream"], true);
    }
}
