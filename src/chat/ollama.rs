//! Ollama chat provider (`POST /api/chat`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ChatCompleter;
use crate::config::ChatConfig;
use crate::error::ChatError;

pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaChat {
    pub fn new(config: &ChatConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        }
    }

    /// List the models installed on the Ollama instance (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Api {
                status_code: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

fn map_send_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout(e.to_string())
    } else {
        ChatError::Network(e.to_string())
    }
}

#[async_trait]
impl ChatCompleter for OllamaChat {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %self.model, prompt_len = prompt.len(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %message, "chat service returned error");
            return Err(ChatError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

        Ok(body.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
