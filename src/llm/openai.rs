// OpenAI-compatible chat completion and embedding client.
//
// One client serves both traits so chat and embedding calls share a single
// rate limiter. Any server speaking the OpenAI wire format works; point
// OPENAI_BASE_URL at it.
//
// API docs: https://platform.openai.com/docs/api-reference

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::traits::{Embedder, TextGenerator};
use crate::config::Config;
use crate::output::truncate_chars;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Sampling temperature for analysis prompts.
const TEMPERATURE: f32 = 0.6;

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    rate_limiter: RateLimiter,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        chat_model: String,
        embedding_model: String,
        requests_per_second: f64,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            chat_model,
            embedding_model,
            rate_limiter: RateLimiter::new(requests_per_second),
        }
    }

    /// Build a client from configuration. Fails if no API key is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.require_llm()?;
        Ok(Self::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.chat_model.clone(),
            config.embedding_model.clone(),
            config.llm_qps,
        ))
    }

    async fn chat(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        self.rate_limiter.acquire().await;

        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            response_format: json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call chat completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion API returned {}: {}", status, body);
        }

        let result: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Chat completion response had no content")?;

        debug!(
            model = %self.chat_model,
            json_mode,
            preview = %truncate_chars(&content, 50),
            "Generated completion"
        );

        Ok(content.trim().to_string())
    }

    async fn embeddings(&self, input: &[String]) -> Result<Vec<Vec<f64>>> {
        self.rate_limiter.acquire().await;

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call embedding API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API returned {}: {}", status, body);
        }

        let mut result: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if result.data.len() != input.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                result.data.len(),
                input.len()
            );
        }

        // The API may return items out of order; `index` is authoritative.
        result.data.sort_by_key(|item| item.index);
        Ok(result.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, false).await
    }

    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, true).await
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.embeddings(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("Embedding API returned no vectors")
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embeddings(texts).await
    }
}

// --- Request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_json_mode_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            temperature: 0.5,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_chat_request_omits_response_format() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: Vec::new(),
            temperature: 0.5,
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_embedding_response_parses() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[0.1,0.2],"index":1},{"embedding":[0.3],"index":0}]}"#,
        )
        .unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].index, 1);
    }
}
