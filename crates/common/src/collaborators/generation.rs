//! Chat completion client for the generation collaborator
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. Without an
//! API key it answers offline with a deterministic reply so the workflow can
//! run end to end in development and tests.

use super::Generator;
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generation collaborator over HTTP
pub struct ChatGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl ChatGenerator {
    /// Create a new generator
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    async fn call_backend(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                collaborator: "generation".to_string(),
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Upstream {
                collaborator: "generation".to_string(),
                message: "Empty response from model".to_string(),
            })
    }

    /// Deterministic reply used when no API key is configured
    fn offline_reply(&self, user_prompt: &str) -> String {
        let question = user_prompt
            .rfind("Query:")
            .map(|start| user_prompt[start + "Query:".len()..].trim())
            .filter(|q| !q.is_empty())
            .unwrap_or("your request");

        format!(
            "Here is what I can tell you about \"{}\" from the information available. \
            [Offline response - generation API key not configured]",
            question
        )
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        if !self.config.is_online() {
            tracing::debug!(model = %self.config.model, "Generation offline, using canned reply");
            return Ok(self.offline_reply(user_prompt));
        }

        self.call_backend(system_prompt, user_prompt).await
    }
}
