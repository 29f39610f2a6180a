//! Centralized default constants for the illume system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// NOTES
// =============================================================================

/// Maximum images attached to a note. A successful generation on a full
/// note evicts the oldest image (FIFO).
pub const MAX_NOTE_IMAGES: usize = 3;

/// Prompt substituted when a note is created or updated with empty content.
pub const DEFAULT_NOTE_PROMPT: &str =
    "Enhance this real-estate photo to make it look bright, clean, modern and professional";

/// Fallback title for untitled notes.
pub const UNTITLED_NOTE_TITLE: &str = "Untitled Note";

// =============================================================================
// PROMPT BUILDING
// =============================================================================

/// Hard character budget for generated image prompts.
pub const PROMPT_MAX_CHARS: usize = 180;

/// Characters of note content carried into the basic prompt.
pub const PROMPT_CONTENT_EXCERPT_CHARS: usize = 40;

/// Subject used by the basic prompt when a note has no title.
pub const PROMPT_GENERIC_SUBJECT: &str = "abstract concept";

/// Detail phrase used by the basic prompt when a note has no content.
pub const PROMPT_GENERIC_DETAILS: &str = "creative interpretation";

/// Sampling temperature for prompt optimization (low for consistency).
pub const PROMPT_TEMPERATURE: f32 = 0.1;

/// Nucleus sampling parameter for prompt optimization.
pub const PROMPT_TOP_P: f32 = 0.9;

/// Token cap for prompt optimization completions.
pub const PROMPT_MAX_TOKENS: u32 = 60;

// =============================================================================
// GENERATION PIPELINE
// =============================================================================

/// Daily generation cap per user (overridable via `GENERATION_DAILY_LIMIT`).
pub const GENERATION_DAILY_LIMIT: i64 = 50;

/// Status marker written to `generated_prompt` while a task is running.
pub const GENERATION_IN_PROGRESS: &str = "Generating image...";

/// Timeout for text-completion requests in seconds.
pub const COMPLETION_TIMEOUT_SECS: u64 = 30;

/// Timeout for image-generation requests in seconds.
pub const IMAGE_TIMEOUT_SECS: u64 = 60;

/// Dispatcher event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// FALLBACK IMAGES
// =============================================================================

/// Canvas edge length (pixels) for locally synthesized placeholder images.
pub const PLACEHOLDER_CANVAS_SIZE: u32 = 512;

/// Maximum keywords pulled from the failed prompt into a placeholder label.
pub const PLACEHOLDER_MAX_KEYWORDS: usize = 3;

/// Keywords shorter than this are skipped when labeling a placeholder.
pub const PLACEHOLDER_MIN_KEYWORD_LEN: usize = 4;

/// Static remote placeholder used only if local SVG synthesis fails.
pub const PLACEHOLDER_REMOTE_URL: &str =
    "https://via.placeholder.com/512x512/4F46E5/FFFFFF?text=Image+Preview";

// =============================================================================
// PROVIDERS
// =============================================================================

/// Default OpenRouter API endpoint.
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

/// Default model for prompt optimization.
pub const PROMPT_MODEL: &str = "anthropic/claude-3.5-sonnet";

/// Default model for image generation.
pub const IMAGE_MODEL: &str = "google/gemini-2.5-flash-image";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default page size for generation history.
pub const GENERATION_HISTORY_LIMIT: i64 = 20;
