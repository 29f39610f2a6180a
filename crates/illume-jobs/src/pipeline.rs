//! The image generation pipeline.
//!
//! One linear pass per request: quota gate → resolve note → build prompt →
//! provider call → persist image → attach to note → audit record. Provider
//! failures never surface to the caller; they re-route through the fallback
//! generator so the pipeline bottoms out in a locally synthesized image.
//! Storage failures are the one fatal case: there is no fallback beneath
//! storage, and the note is left unmodified.
//!
//! All collaborators are injected at construction and shared behind `Arc`,
//! so concurrent pipeline runs share no hidden mutable state.

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use illume_core::{
    defaults, Error, GenerationLogRepository, GenerationOutcome, GenerationRequest,
    ImageGenerationBackend, NewGenerationRecord, NoteRepository, ObjectStore, Result,
    TextCompletionBackend,
};

use crate::aspect::select_aspect_ratio;
use crate::fallback::{fallback_prompt, placeholder_image, FallbackReason};
use crate::prompt::{PromptBuilder, PromptContext};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Daily generation cap per user. Must be at least 1.
    pub daily_limit: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            daily_limit: defaults::GENERATION_DAILY_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `GENERATION_DAILY_LIMIT` | `50` | Daily generation cap per user |
    pub fn from_env() -> Self {
        let daily_limit = std::env::var("GENERATION_DAILY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v >= 1)
            .unwrap_or(defaults::GENERATION_DAILY_LIMIT);
        Self { daily_limit }
    }

    /// Set the daily limit.
    pub fn with_daily_limit(mut self, limit: i64) -> Self {
        self.daily_limit = limit;
        self
    }
}

/// Today's quota usage for a user.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

/// The generation pipeline with all collaborators injected.
pub struct GenerationPipeline {
    notes: Arc<dyn NoteRepository>,
    log: Arc<dyn GenerationLogRepository>,
    objects: Arc<dyn ObjectStore>,
    prompt_builder: PromptBuilder,
    images: Option<Arc<dyn ImageGenerationBackend>>,
    http: reqwest::Client,
    config: PipelineConfig,
}

impl GenerationPipeline {
    /// Create a new pipeline.
    ///
    /// `completion` and `images` are `None` when the corresponding provider
    /// credential is absent; the pipeline then goes straight to the basic
    /// prompt and the fallback image without attempting any network call.
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        log: Arc<dyn GenerationLogRepository>,
        objects: Arc<dyn ObjectStore>,
        completion: Option<Arc<dyn TextCompletionBackend>>,
        images: Option<Arc<dyn ImageGenerationBackend>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            notes,
            log,
            objects,
            prompt_builder: PromptBuilder::new(completion),
            images,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Current quota usage for a user (today, UTC).
    pub async fn quota(&self, owner_id: Uuid) -> Result<QuotaStatus> {
        let used = self
            .log
            .count_for_day(owner_id, Utc::now().date_naive())
            .await?;
        Ok(QuotaStatus {
            used,
            limit: self.config.daily_limit,
            remaining: (self.config.daily_limit - used).max(0),
        })
    }

    /// Quota gate: error if the user is at or over the daily cap.
    ///
    /// Runs before any provider call; the dispatcher also calls this
    /// synchronously so background requests surface `RateLimited` to the
    /// caller instead of failing silently.
    pub async fn check_quota(&self, owner_id: Uuid) -> Result<QuotaStatus> {
        let status = self.quota(owner_id).await?;
        if status.used >= status.limit {
            return Err(Error::RateLimited {
                used: status.used,
                limit: status.limit,
            });
        }
        Ok(status)
    }

    /// Run one generation request to completion.
    ///
    /// Returns the outcome payload, or one of the fatal errors:
    /// `RateLimited`, `NoteNotFound`, `Storage`, `Database`.
    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationOutcome> {
        let start = Instant::now();

        let quota = self.check_quota(request.owner_id).await?;
        let note = self.notes.fetch(request.note_id, request.owner_id).await?;
        let previous_prompt = note.generated_prompt.clone();

        info!(
            subsystem = "pipeline",
            op = "generate",
            note_id = %request.note_id,
            owner_id = %request.owner_id,
            style = %request.style,
            "Starting image generation"
        );

        // Progress marker; restored or replaced before this function returns.
        self.notes
            .set_generated_prompt(
                request.note_id,
                request.owner_id,
                Some(defaults::GENERATION_IN_PROGRESS),
            )
            .await?;

        let ctx = PromptContext::from_note(&note, request.style, request.use_existing_images);
        let prompt = self.prompt_builder.build(&ctx).await;
        let aspect_ratio = request
            .aspect_ratio
            .unwrap_or_else(|| select_aspect_ratio(&prompt, request.style));

        // Provider call; any failure becomes a fallback image, never an error.
        let (image_url, final_prompt, fallback) = match self.generate(&prompt, aspect_ratio).await
        {
            Ok(url) => (url, prompt.clone(), None),
            Err(e) => {
                let reason = FallbackReason::from_error(&e);
                warn!(
                    subsystem = "pipeline",
                    op = "generate",
                    note_id = %request.note_id,
                    fallback_reason = %reason,
                    error = %e,
                    "Provider failed, generating placeholder"
                );
                (
                    placeholder_image(&prompt, reason),
                    fallback_prompt(&prompt, reason),
                    Some(reason),
                )
            }
        };

        // Persist the image. A provider image that cannot be persisted is
        // itself a provider failure; degrade once more to the placeholder.
        // A placeholder that cannot be persisted is fatal.
        let (object_id, durable_url, final_prompt, fallback) = match self
            .store_image(&image_url)
            .await
        {
            Ok((id, url)) => (id, url, final_prompt, fallback),
            Err(e) if fallback.is_none() => {
                let reason = FallbackReason::UndefinedProperties;
                warn!(
                    subsystem = "pipeline",
                    op = "store_image",
                    note_id = %request.note_id,
                    error = %e,
                    "Provider image could not be persisted, degrading to placeholder"
                );
                let url = placeholder_image(&prompt, reason);
                match self.store_image(&url).await {
                    Ok((id, stored_url)) => {
                        (id, stored_url, fallback_prompt(&prompt, reason), Some(reason))
                    }
                    Err(e) => return self.abort(&request, previous_prompt.as_deref(), e).await,
                }
            }
            Err(e) => return self.abort(&request, previous_prompt.as_deref(), e).await,
        };

        // Attach to the note; evicted FIFO blobs are released best-effort.
        // A failure here (e.g. the note was deleted mid-run) orphans the
        // stored blob, which abort() logs; no compensation beyond that.
        let (image, evicted) = match self
            .notes
            .attach_image(
                request.note_id,
                request.owner_id,
                object_id,
                &durable_url,
                Some(&final_prompt),
            )
            .await
        {
            Ok(v) => v,
            Err(e) => return self.abort(&request, previous_prompt.as_deref(), e).await,
        };
        for old_object in evicted {
            if let Err(e) = self.objects.delete(old_object).await {
                warn!(
                    subsystem = "pipeline",
                    op = "evict",
                    object_id = %old_object,
                    error = %e,
                    "Failed to release evicted image object"
                );
            }
        }

        self.log
            .record(NewGenerationRecord {
                owner_id: request.owner_id,
                note_id: request.note_id,
                date: Utc::now().date_naive(),
                prompt: final_prompt.clone(),
                image_url: durable_url.clone(),
                success: fallback.is_none(),
            })
            .await?;

        info!(
            subsystem = "pipeline",
            op = "generate",
            note_id = %request.note_id,
            image_id = %image.id,
            success = fallback.is_none(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Image generation finished"
        );

        Ok(GenerationOutcome {
            image_url: durable_url,
            prompt: final_prompt,
            image_id: image.id,
            generations_remaining: (quota.limit - quota.used - 1).max(0),
        })
    }

    /// Call the image backend, treating an unconfigured backend as a
    /// provider failure.
    async fn generate(&self, prompt: &str, aspect_ratio: illume_core::AspectRatio) -> Result<String> {
        let backend = self.images.as_ref().ok_or_else(|| {
            Error::ProviderUnavailable("no image generation backend configured".to_string())
        })?;
        let image = backend.generate_image(prompt, aspect_ratio).await?;
        Ok(image.url)
    }

    /// Resolve an image reference to bytes and persist it, returning the
    /// object id and its durable URL.
    async fn store_image(&self, image_url: &str) -> Result<(Uuid, String)> {
        let (bytes, content_type) = self.load_image_bytes(image_url).await?;

        let object_id = self.objects.store(&bytes, &content_type).await?;
        let durable_url = self
            .objects
            .url(object_id)
            .await?
            .ok_or_else(|| Error::Storage("stored object has no URL".to_string()))?;

        debug!(
            subsystem = "pipeline",
            op = "store_image",
            object_id = %object_id,
            size = bytes.len(),
            content_type = %content_type,
            "Image persisted"
        );
        Ok((object_id, durable_url))
    }

    /// Decode a data URL or fetch an HTTP URL into raw bytes.
    async fn load_image_bytes(&self, image_url: &str) -> Result<(Vec<u8>, String)> {
        if let Some(rest) = image_url.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| Error::Storage("malformed data URL".to_string()))?;
            let content_type = header
                .split(';')
                .next()
                .filter(|mime| !mime.is_empty())
                .unwrap_or("image/png")
                .to_string();
            let bytes = BASE64
                .decode(payload)
                .map_err(|e| Error::Storage(format!("data URL decode failed: {}", e)))?;
            return Ok((bytes, content_type));
        }

        let response = self
            .http
            .get(image_url)
            .timeout(std::time::Duration::from_secs(
                defaults::IMAGE_TIMEOUT_SECS,
            ))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("image fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "image fetch returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("image body read failed: {}", e)))?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Fatal-path cleanup: restore the note's previous prompt marker and
    /// propagate the error. The stored blob (if any) is already gone or
    /// orphaned; orphans are logged by the caller and cleaned out of band.
    async fn abort<T>(
        &self,
        request: &GenerationRequest,
        previous_prompt: Option<&str>,
        err: Error,
    ) -> Result<T> {
        warn!(
            subsystem = "pipeline",
            op = "generate",
            note_id = %request.note_id,
            error = %err,
            "Generation failed, restoring note state"
        );
        if let Err(restore_err) = self
            .notes
            .set_generated_prompt(request.note_id, request.owner_id, previous_prompt)
            .await
        {
            warn!(
                subsystem = "pipeline",
                note_id = %request.note_id,
                error = %restore_err,
                "Failed to restore generated_prompt after fatal error"
            );
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.daily_limit, defaults::GENERATION_DAILY_LIMIT);
    }

    #[test]
    fn test_pipeline_config_builder() {
        let config = PipelineConfig::default().with_daily_limit(5);
        assert_eq!(config.daily_limit, 5);
    }
}
