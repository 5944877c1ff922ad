//! A minimal OpenAI-compatible chat-completion client.
//!
//! The gateway never streams guardrail evaluations back to a caller — a
//! guardrail needs one scored verdict per request, not a token stream —
//! so this client only implements the non-streaming `/chat/completions`
//! call, trimmed down from the provider clients this workspace otherwise
//! uses for end-user chat traffic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self { model: model.into(), messages, temperature: 0.0, max_tokens: Some(256) }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: Option<String>,
}

/// A chat-completion client talking to any OpenAI-compatible endpoint
/// (OpenAI, Groq, and anything exposing the same `/v1/chat/completions`
/// contract).
pub struct LlmClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build LLM HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn openai(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, timeout)
    }

    pub fn groq(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::new("groq", "https://api.groq.com/openai/v1", api_key, timeout)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey(self.name.clone()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });

        tracing::debug!(provider = %self.name, model = %request.model, "sending guardrail completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("response contained no choices".into()))?;

        Ok(CompletionResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_is_rejected_before_any_network_call() {
        let client = LlmClient::new("test", "https://example.invalid", "", Duration::from_secs(1));
        let request = CompletionRequest::new("test-model", vec![ChatMessage::user("hi")]);
        let err = client.complete(request).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(name) if name == "test"));
    }

    #[test]
    fn request_defaults_are_conservative() {
        let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("hi")]);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, Some(256));
    }

    #[test]
    fn chat_message_constructors_set_role() {
        let sys = ChatMessage::system("be terse");
        assert_eq!(sys.role, ChatRole::System);
        let user = ChatMessage::user("hello");
        assert_eq!(user.role, ChatRole::User);
    }
}
