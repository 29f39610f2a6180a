//! # illume-jobs
//!
//! Image generation pipeline for illume.
//!
//! This crate provides:
//! - Heuristic prompt construction with an enhanced (provider-backed) and a
//!   basic (local) strategy
//! - Aspect-ratio selection from prompt text and style
//! - A fallback generator that synthesizes placeholder images locally
//! - The linear generation pipeline: quota gate → prompt → provider call →
//!   storage → note update → audit record
//! - A fire-and-forget dispatcher with broadcast progress events
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use illume_jobs::{GenerationDispatcher, GenerationPipeline, PipelineConfig};
//! use illume_core::GenerationRequest;
//!
//! let pipeline = Arc::new(GenerationPipeline::new(
//!     notes, log, objects, completion, images, PipelineConfig::from_env(),
//! ));
//!
//! // Synchronous: run to completion and get the outcome payload.
//! let outcome = pipeline.run(GenerationRequest::new(owner_id, note_id)).await?;
//!
//! // Or fire-and-forget through the dispatcher.
//! let dispatcher = GenerationDispatcher::new(pipeline);
//! let task_id = dispatcher.dispatch(GenerationRequest::new(owner_id, note_id));
//! ```

pub mod aspect;
pub mod dispatcher;
pub mod fallback;
pub mod pipeline;
pub mod prompt;

// Re-export core types
pub use illume_core::*;

pub use aspect::select_aspect_ratio;
pub use dispatcher::{GenerationDispatcher, GenerationEvent};
pub use fallback::{fallback_prompt, placeholder_image, prompt_keywords, FallbackReason};
pub use pipeline::{GenerationPipeline, PipelineConfig, QuotaStatus};
pub use prompt::{
    analyze_content, classify_content_type, classify_mood, generate_basic_prompt,
    suggest_visual_elements, PromptBuilder, PromptContext,
};
