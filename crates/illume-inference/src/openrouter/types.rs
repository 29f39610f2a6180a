//! OpenRouter chat-completions request and response types.
//!
//! Image generation rides the same endpoint as text completion: the request
//! adds `modalities` and an `image_config` carrying the aspect ratio, and
//! the response embeds generated images on the assistant message.

use serde::{Deserialize, Serialize};

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Request body for the chat completions endpoint.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Requested output modalities; image generation asks for both
    /// `["image", "text"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Image generation parameters.
#[derive(Debug, Serialize)]
pub struct ImageConfig {
    /// Explicit aspect ratio, e.g. `"3:4"`.
    pub aspect_ratio: String,
}

// =============================================================================
// RESPONSE TYPES
// =============================================================================

/// Response from the chat completions endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// Single completion choice.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
}

/// Assistant message, optionally carrying generated images.
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<MessageImage>>,
}

/// One generated image on an assistant message.
#[derive(Debug, Deserialize)]
pub struct MessageImage {
    pub image_url: ImageUrl,
}

/// Image reference, typically a base64 data URL.
#[derive(Debug, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}
