use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::sse::SseDecoder;
use crate::stream::CompletionStream;
use crate::traits::{ChatMessage, CompletionClient, ModelParams, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for OpenAI-compatible chat-completion APIs.
///
/// System instructions travel inside the ordered message list, so the
/// request body is a direct mapping of the messages given.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
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

    /// Point at an OpenAI-compatible endpoint other than the default.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read the API key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Auth("OPENAI_API_KEY not set".to_string()))?;
        Self::new(key)
    }

    fn request_body(messages: &[ChatMessage], params: &ModelParams, stream: bool) -> Value {
        let msgs: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": params.model,
            "messages": msgs,
            "max_tokens": params.max_tokens,
            "stream": stream,
        });
        if let Some(temperature) = params.temperature {
            body.as_object_mut()
                .expect("body is an object")
                .insert("temperature".into(), json!(temperature));
        }
        body
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %params.model, stream, "Requesting OpenAI completion");

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
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
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
    ) -> Result<String, ProviderError> {
        let resp = self.send(messages, params, false).await?;
        let v: Value = resp.json().await?;
        let content = v
            .pointer("/choices/0/message/content")
            .and_then(|x| x.as_str())
            .ok_or_else(|| {
                ProviderError::Malformed("missing choices[0].message.content".to_string())
            })?;
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
                    if payload == "[DONE]" {
                        return;
                    }
                    let fragment = serde_json::from_str::<Value>(&payload)
                        .ok()
                        .and_then(|v| {
                            v.pointer("/choices/0/delta/content")
                                .and_then(|x| x.as_str())
                                .map(str::to_string)
                        });
                    if let Some(fragment) = fragment {
                        if !fragment.is_empty() && tx.send(Ok(fragment)).await.is_err() {
                            return; // consumer aborted
                        }
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
    use crate::traits::Role;

    #[test]
    fn system_message_stays_inside_the_list() {
        let messages = vec![
            ChatMessage::new(Role::System, "interview outline"),
            ChatMessage::new(Role::User, "Hi"),
        ];
        let params = ModelParams::new("gpt-4o", 1024).with_temperature(0.7);
        let body = OpenAiClient::request_body(&messages, &params, true);

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "interview outline");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 1024);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn temperature_omitted_when_unset() {
        let messages = vec![ChatMessage::new(Role::User, "Hi")];
        let params = ModelParams::new("gpt-4o", 256);
        let body = OpenAiClient::request_body(&messages, &params, false);
        assert!(body.get("temperature").is_none());
    }
}
