use crate::config::OpenAiConfig;
use crate::error::CapabilityError;
use crate::net::with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Opaque prompt-to-text generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Generation client for an OpenAI-compatible `/chat/completions` endpoint,
/// with a request timeout and bounded retry.
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    base: Url,
    client: Client,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self, CapabilityError> {
        let base = config.base_url()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, CapabilityError> {
        let url = self.base.join("chat/completions")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&ChatRequest {
                model: &self.config.generation_model,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: 0.0,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CapabilityError::Backend {
                service: "generation",
                details: response.status().to_string(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CapabilityError::Backend {
                service: "generation",
                details: "response carried no choices".to_string(),
            })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        with_retry(self.config.retry, || self.complete_once(prompt)).await
    }
}
