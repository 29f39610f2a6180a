//! OpenRouter-compatible inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use illume_core::{
    AspectRatio, Error, GeneratedImage, ImageGenerationBackend, Result, TextCompletionBackend,
};

use super::types::*;
use crate::config::OpenRouterConfig;

/// OpenRouter-compatible backend for text completion and image generation.
///
/// Both operations ride the chat-completions endpoint; image generation
/// additionally requests the image modality and carries an explicit aspect
/// ratio. Constructed once per process and shared behind `Arc` by whoever
/// drives the pipeline.
pub struct OpenRouterBackend {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        // Per-request timeouts differ between completion and image calls,
        // so the client itself carries none.
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            subsystem = "inference",
            component = "openrouter",
            base_url = %config.base_url,
            prompt_model = %config.prompt_model,
            image_model = %config.image_model,
            "Initializing OpenRouter backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenRouterConfig::from_env()?)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    /// Build an authenticated POST to the chat completions endpoint.
    fn build_request(&self) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if let Some(ref referer) = self.config.http_referer {
            req = req.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.config.x_title {
            req = req.header("X-Title", title);
        }

        req
    }
}

#[async_trait]
impl TextCompletionBackend for OpenRouterBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.config.prompt_model.clone(),
            messages,
            temperature: Some(illume_core::defaults::PROMPT_TEMPERATURE),
            top_p: Some(illume_core::defaults::PROMPT_TOP_P),
            max_tokens: Some(illume_core::defaults::PROMPT_MAX_TOKENS),
            modalities: None,
            image_config: None,
        };

        let response = self
            .build_request()
            .timeout(self.config.completion_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "inference",
                component = "openrouter",
                op = "complete",
                status = %status,
                "Completion request rejected"
            );
            return Err(Error::ProviderUnavailable(format!(
                "completion returned {}: {}",
                status, body
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("malformed completion response: {}", e)))?;

        let content = result
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::ProviderUnavailable("empty completion response".to_string()))?;

        debug!(
            subsystem = "inference",
            component = "openrouter",
            op = "complete",
            model = %self.config.prompt_model,
            response_len = content.len(),
            "Completion succeeded"
        );
        Ok(content.to_string())
    }

    fn model_name(&self) -> &str {
        &self.config.prompt_model
    }
}

#[async_trait]
impl ImageGenerationBackend for OpenRouterBackend {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImage> {
        let request = ChatCompletionRequest {
            model: self.config.image_model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: None,
            top_p: None,
            max_tokens: None,
            modalities: Some(vec!["image".to_string(), "text".to_string()]),
            image_config: Some(ImageConfig {
                aspect_ratio: aspect_ratio.as_str().to_string(),
            }),
        };

        debug!(
            subsystem = "inference",
            component = "openrouter",
            op = "generate_image",
            model = %self.config.image_model,
            prompt_len = prompt.len(),
            aspect_ratio = %aspect_ratio,
            "Requesting image generation"
        );

        let response = self
            .build_request()
            .timeout(self.config.image_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("image request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 402 || body.contains("Insufficient credits") {
                return Err(Error::InsufficientCredits(format!(
                    "image generation returned {}: {}",
                    status, body
                )));
            }
            return Err(Error::ProviderUnavailable(format!(
                "image generation returned {}: {}",
                status, body
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("malformed image response: {}", e)))?;

        let url = result
            .choices
            .first()
            .and_then(|c| c.message.images.as_ref())
            .and_then(|images| images.first())
            .map(|image| image.image_url.url.clone())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::ProviderUnavailable("no image payload in response".to_string())
            })?;

        debug!(
            subsystem = "inference",
            component = "openrouter",
            op = "generate_image",
            model = %self.config.image_model,
            "Image generated"
        );
        Ok(GeneratedImage { url })
    }

    fn model_name(&self) -> &str {
        &self.config.image_model
    }
}
