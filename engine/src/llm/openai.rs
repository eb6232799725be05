use super::{LlmError, LlmProvider, Message, QueryPlan};
use crate::config::OpenAIConfig;
use async_trait::async_trait;
use serde_json::json;

/// Environment variable holding the OpenAI API key
const API_KEY_VAR: &str = "OPENAI_API_KEY";

pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> super::Result<String> {
        std::env::var(API_KEY_VAR)
            .map_err(|_| LlmError::AuthenticationFailed(format!("{} is not set", API_KEY_VAR)))
    }

    /// Issue a chat completion call. When `json_output` is set, the request
    /// uses `response_format: json_object` so the model must emit JSON.
    async fn chat(&self, messages: &[Message], json_output: bool) -> super::Result<String> {
        let api_key = self.api_key()?;

        let url = format!("{}/chat/completions", self.config.base_url);

        let mut api_messages = Vec::new();
        for msg in messages {
            api_messages.push(json!({
                "role": msg.role.to_string(),
                "content": msg.content
            }));
        }

        let mut payload = json!({
            "model": self.config.model,
            "messages": api_messages,
        });

        if json_output {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LlmError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LlmError::RateLimitExceeded);
            } else {
                return Err(LlmError::InvalidRequest(text));
            }
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))?;

        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::ParseError("No message in choice".to_string()))?;

        match message.get("content").and_then(|c| c.as_str()) {
            Some(content) => Ok(content.to_string()),
            None => Err(LlmError::ParseError("Empty content".to_string())),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn complete(&self, messages: &[Message]) -> super::Result<String> {
        self.chat(messages, false).await
    }

    async fn generate_query(&self, messages: &[Message]) -> super::Result<QueryPlan> {
        let content = self.chat(messages, true).await?;
        super::parse_query_plan(&content)
    }
}
