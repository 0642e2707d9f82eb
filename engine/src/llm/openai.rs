use super::{EmbeddingProvider, GenerationProvider, LLMError, PromptContext};
use crate::config::OpenAIConfig;
use async_trait::async_trait;
use serde_json::json;

/// Provider for any OpenAI-compatible API (chat completions + embeddings)
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
        if let Some(key) = &self.config.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| LLMError::AuthenticationFailed("OPENAI_API_KEY not set".to_string()))
    }

    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> super::Result<serde_json::Value> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else if status.is_server_error() {
                return Err(LLMError::ProviderUnavailable(text));
            } else {
                return Err(LLMError::InvalidRequest(text));
            }
        }

        response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl GenerationProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn check_health(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn generate(&self, context: &PromptContext) -> super::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let (system, user) = context.render_messages();

        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let data = self.post_json(&url, &payload).await?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| LLMError::ParseError("No content in response".to_string()))?;

        if content.trim().is_empty() {
            return Err(LLMError::ParseError("Empty content".to_string()));
        }

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> super::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url);

        let payload = json!({
            "model": self.config.embedding_model,
            "input": text,
        });

        let data = self.post_json(&url, &payload).await?;

        let embedding = data
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|item| item.get("embedding"))
            .and_then(|e| e.as_array())
            .ok_or_else(|| LLMError::ParseError("No embedding in response".to_string()))?;

        embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| LLMError::ParseError("Non-numeric embedding value".to_string()))
            })
            .collect()
    }
}
