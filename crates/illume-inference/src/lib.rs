//! # illume-inference
//!
//! External provider backends for illume.
//!
//! This crate provides:
//! - OpenRouter-compatible HTTP client implementing both
//!   [`TextCompletionBackend`](illume_core::TextCompletionBackend) (prompt
//!   optimization) and
//!   [`ImageGenerationBackend`](illume_core::ImageGenerationBackend)
//!   (image synthesis via the chat-completions image modality)
//! - Typed error mapping: HTTP 402 becomes `InsufficientCredits`, every
//!   other failure shape becomes `ProviderUnavailable`
//! - Mock backends for testing (feature `mock`)
//!
//! # Feature Flags
//!
//! - `mock`: Enable deterministic mock backends for dependent crates' tests
//!
//! # Example
//!
//! ```rust,no_run
//! use illume_inference::OpenRouterBackend;
//! use illume_core::TextCompletionBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenRouterBackend::from_env().unwrap();
//!     let prompt = backend
//!         .complete("You write image prompts.", "A mountain sunset")
//!         .await
//!         .unwrap();
//!     println!("{prompt}");
//! }
//! ```

pub mod config;
pub mod openrouter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use illume_core::*;

pub use config::OpenRouterConfig;
pub use openrouter::OpenRouterBackend;
