//! Content-generation provider: LLM completions, image synthesis and
//! image edits. Every outbound AI call goes through this module.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("provider timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider returned empty content")]
    EmptyContent,

    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(e)
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Text completion for a single user message.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;
    /// Raw image bytes (JPEG) for a prompt.
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, ProviderError>;
    /// URL of `source_url` with its background removed.
    async fn remove_background(&self, source_url: &str) -> Result<String, ProviderError>;
    /// URL of `source_url` with `object` erased.
    async fn remove_object(&self, source_url: &str, object: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
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
    content: Option<String>,
}

/// OpenAI-compatible chat completions for text, an HTTP prompt-to-image
/// endpoint for images, and Cloudinary fetch transformations for edits.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    cfg: AiConfig,
}

impl HttpProvider {
    pub fn new(cfg: AiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { client, cfg })
    }

    fn cloudinary_fetch(&self, effect: &str, source_url: &str) -> Result<String, ProviderError> {
        if self.cfg.cloudinary_cloud_name.is_empty() {
            return Err(ProviderError::NotConfigured("CLOUDINARY_CLOUD_NAME"));
        }
        Ok(cloudinary_fetch_url(
            &self.cfg.cloudinary_cloud_name,
            effect,
            source_url,
        ))
    }
}

pub(crate) fn cloudinary_fetch_url(cloud: &str, effect: &str, source_url: &str) -> String {
    format!(
        "https://res.cloudinary.com/{cloud}/image/fetch/{effect}/{}",
        urlencoding::encode(source_url)
    )
}

/// Collapses runs of whitespace so equivalent prompts map to the same URL.
pub(crate) fn clean_prompt(prompt: &str) -> String {
    prompt.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        if self.cfg.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("AI_API_KEY"));
        }
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens,
        };

        let res = self
            .client
            .post(format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/')))
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            warn!(%status, "completion request failed");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = res.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyContent)?;
        debug!(chars = text.len(), "completion succeeded");
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Bytes, ProviderError> {
        let url = format!(
            "{}/{}",
            self.cfg.image_api_url.trim_end_matches('/'),
            urlencoding::encode(&clean_prompt(prompt))
        );
        let res = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "image/*")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyContent);
        }
        debug!(size = bytes.len(), "image generated");
        Ok(bytes)
    }

    async fn remove_background(&self, source_url: &str) -> Result<String, ProviderError> {
        self.cloudinary_fetch("e_background_removal", source_url)
    }

    async fn remove_object(&self, source_url: &str, object: &str) -> Result<String, ProviderError> {
        let effect = format!("e_gen_remove:prompt_{}", urlencoding::encode(object));
        self.cloudinary_fetch(&effect, source_url)
    }
}
