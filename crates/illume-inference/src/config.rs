//! OpenRouter provider configuration.

use std::time::Duration;

use illume_core::{defaults, Error, Result};

/// Configuration for the OpenRouter-compatible backend.
///
/// The bearer credential is required: its absence is detected here, before
/// any network call is attempted, so callers can route straight to the
/// local fallback path instead of failing mid-pipeline.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model used for prompt optimization.
    pub prompt_model: String,
    /// Model used for image generation.
    pub image_model: String,
    /// Timeout for text-completion requests.
    pub completion_timeout: Duration,
    /// Timeout for image-generation requests.
    pub image_timeout: Duration,
    /// HTTP-Referer header for OpenRouter rankings (optional).
    pub http_referer: Option<String>,
    /// X-Title header for app attribution on OpenRouter (optional).
    pub x_title: Option<String>,
}

impl OpenRouterConfig {
    /// Create a config with the given credential and all defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: defaults::OPENROUTER_URL.to_string(),
            api_key: api_key.into(),
            prompt_model: defaults::PROMPT_MODEL.to_string(),
            image_model: defaults::IMAGE_MODEL.to_string(),
            completion_timeout: Duration::from_secs(defaults::COMPLETION_TIMEOUT_SECS),
            image_timeout: Duration::from_secs(defaults::IMAGE_TIMEOUT_SECS),
            http_referer: None,
            x_title: None,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `OPENROUTER_API_KEY` | (required) | Bearer credential |
    /// | `OPENROUTER_BASE_URL` | `https://openrouter.ai/api/v1` | API endpoint |
    /// | `OPENROUTER_PROMPT_MODEL` | `anthropic/claude-3.5-sonnet` | Prompt optimization model |
    /// | `OPENROUTER_IMAGE_MODEL` | `google/gemini-2.5-flash-image` | Image generation model |
    /// | `OPENROUTER_COMPLETION_TIMEOUT` | `30` | Completion timeout (seconds) |
    /// | `OPENROUTER_IMAGE_TIMEOUT` | `60` | Image timeout (seconds) |
    /// | `OPENROUTER_HTTP_REFERER` | (none) | Attribution header |
    /// | `OPENROUTER_X_TITLE` | (none) | Attribution header |
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENROUTER_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);

        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENROUTER_PROMPT_MODEL") {
            config.prompt_model = model;
        }
        if let Ok(model) = std::env::var("OPENROUTER_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(secs) = std::env::var("OPENROUTER_COMPLETION_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.completion_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = std::env::var("OPENROUTER_IMAGE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.image_timeout = Duration::from_secs(secs);
        }
        config.http_referer = std::env::var("OPENROUTER_HTTP_REFERER").ok();
        config.x_title = std::env::var("OPENROUTER_X_TITLE").ok();

        Ok(config)
    }

    /// Set the base URL (builder style, for tests against a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OpenRouterConfig::new("sk-test");
        assert_eq!(config.base_url, defaults::OPENROUTER_URL);
        assert_eq!(config.prompt_model, defaults::PROMPT_MODEL);
        assert_eq!(config.image_model, defaults::IMAGE_MODEL);
        assert_eq!(config.completion_timeout, Duration::from_secs(30));
        assert_eq!(config.image_timeout, Duration::from_secs(60));
        assert!(config.http_referer.is_none());
    }

    #[test]
    fn test_with_base_url() {
        let config = OpenRouterConfig::new("sk-test").with_base_url("http://localhost:9999");
        assert_eq!(config.base_url, "http://localhost:9999");
    }
}
