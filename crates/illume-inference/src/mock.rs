//! Mock provider backends for deterministic testing.
//!
//! Enabled with the `mock` feature so dependent crates can drive the
//! generation pipeline without network access. Each mock records its calls
//! for assertions and can be scripted to fail with a chosen error.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use illume_inference::mock::{MockCompletionBackend, MockImageBackend};
//!
//! let completion = MockCompletionBackend::new()
//!     .with_response("photorealistic portrait, soft lighting");
//! let images = MockImageBackend::new().failing_with_insufficient_credits();
//! ```

use std::sync::Mutex;

use async_trait::async_trait;

use illume_core::{
    AspectRatio, Error, GeneratedImage, ImageGenerationBackend, Result, TextCompletionBackend,
};

/// A 1x1 transparent PNG, as the data URL a real provider would embed.
pub const MOCK_IMAGE_DATA_URL: &str = "data:image/png;base64,\
iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+P+/HgAFhAJ/wlseKgAAAABJRU5ErkJggg==";

/// Failure mode for a scripted mock call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Provider rejects for lack of credits (HTTP 402 equivalent).
    InsufficientCredits,
    /// Generic provider failure (non-2xx, malformed payload, timeout).
    Unavailable,
}

impl MockFailure {
    fn to_error(self, op: &str) -> Error {
        match self {
            MockFailure::InsufficientCredits => {
                Error::InsufficientCredits(format!("mock {}: 402 Insufficient credits", op))
            }
            MockFailure::Unavailable => {
                Error::ProviderUnavailable(format!("mock {}: injected failure", op))
            }
        }
    }
}

/// Mock text-completion backend.
pub struct MockCompletionBackend {
    response: String,
    failure: Option<MockFailure>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockCompletionBackend {
    pub fn new() -> Self {
        Self {
            response: "photorealistic scene, balanced composition, soft natural lighting"
                .to_string(),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the completion text returned by every call.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Make every call fail with a generic provider error.
    pub fn failing(mut self) -> Self {
        self.failure = Some(MockFailure::Unavailable);
        self
    }

    /// Logged `(system, user)` message pairs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockCompletionBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextCompletionBackend for MockCompletionBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match self.failure {
            Some(failure) => Err(failure.to_error("complete")),
            None => Ok(self.response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock/completion"
    }
}

/// Mock image-generation backend.
pub struct MockImageBackend {
    url: String,
    failure: Option<MockFailure>,
    calls: Mutex<Vec<(String, AspectRatio)>>,
}

impl MockImageBackend {
    pub fn new() -> Self {
        Self {
            url: MOCK_IMAGE_DATA_URL.to_string(),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the image URL returned by every call.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Make every call fail with a generic provider error.
    pub fn failing(mut self) -> Self {
        self.failure = Some(MockFailure::Unavailable);
        self
    }

    /// Make every call fail as if the account were out of credits.
    pub fn failing_with_insufficient_credits(mut self) -> Self {
        self.failure = Some(MockFailure::InsufficientCredits);
        self
    }

    /// Logged `(prompt, aspect_ratio)` pairs.
    pub fn calls(&self) -> Vec<(String, AspectRatio)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockImageBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationBackend for MockImageBackend {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImage> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), aspect_ratio));
        match self.failure {
            Some(failure) => Err(failure.to_error("generate_image")),
            None => Ok(GeneratedImage {
                url: self.url.clone(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "mock/image"
    }
}
