//! Core traits for illume abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability. The
//! generation pipeline receives every collaborator through these traits
//! (constructed once per process and passed in), so there is no hidden
//! shared state between concurrent generations.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

/// Repository for note CRUD operations. All reads and mutations are scoped
/// to the owning user; a note that exists but belongs to someone else is
/// indistinguishable from a missing one.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note and return its id.
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Uuid>;

    /// Fetch a note by id, scoped to the owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note>;

    /// List the owner's notes matching the given filters, newest first.
    async fn list(&self, owner_id: Uuid, req: ListNotesRequest) -> Result<Vec<Note>>;

    /// Update title, content, and tags.
    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateNoteRequest) -> Result<()>;

    /// Delete a note and its image sub-records. Returns the stored-object
    /// ids that were attached so the caller can release them.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<Vec<Uuid>>;

    /// Distinct tags across the owner's notes, sorted.
    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>>;

    /// Append an image to a note, evicting the oldest image when the note
    /// is already at the cap. `prompt`, when given, overwrites the note's
    /// `generated_prompt` in the same transaction (the generation pipeline
    /// passes it; plain uploads do not). Returns the new image record and
    /// the object ids evicted (if any).
    async fn attach_image(
        &self,
        note_id: Uuid,
        owner_id: Uuid,
        object_id: Uuid,
        url: &str,
        prompt: Option<&str>,
    ) -> Result<(NoteImage, Vec<Uuid>)>;

    /// Overwrite the `generated_prompt` status field (progress marker).
    async fn set_generated_prompt(
        &self,
        note_id: Uuid,
        owner_id: Uuid,
        prompt: Option<&str>,
    ) -> Result<()>;
}

// =============================================================================
// GENERATION LOG
// =============================================================================

/// Append-only audit trail of generation attempts, used for daily quota
/// counting and history. Records are never mutated.
#[async_trait]
pub trait GenerationLogRepository: Send + Sync {
    /// Append one record for a completed attempt.
    async fn record(&self, rec: NewGenerationRecord) -> Result<Uuid>;

    /// Count the owner's records for a calendar date.
    async fn count_for_day(&self, owner_id: Uuid, date: NaiveDate) -> Result<i64>;

    /// The owner's most recent records, newest first.
    async fn recent(&self, owner_id: Uuid, limit: i64) -> Result<Vec<GenerationRecord>>;
}

// =============================================================================
// OBJECT STORAGE
// =============================================================================

/// Binary object storage with durable public URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes and return the new object id.
    async fn store(&self, data: &[u8], content_type: &str) -> Result<Uuid>;

    /// Durable public URL for an object, or `None` if it does not exist.
    async fn url(&self, id: Uuid) -> Result<Option<String>>;

    /// Fetch object bytes and content type.
    async fn fetch(&self, id: Uuid) -> Result<(Vec<u8>, String)>;

    /// Delete an object and its bytes.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// PROVIDER BACKENDS
// =============================================================================

/// Text-completion provider used to synthesize optimized image prompts.
#[async_trait]
pub trait TextCompletionBackend: Send + Sync {
    /// Run a single system+user completion and return the completion text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// An image produced by a generation provider.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Either a `data:` URL with embedded base64 bytes or an HTTP(S) URL.
    pub url: String,
}

/// Image-generation provider.
#[async_trait]
pub trait ImageGenerationBackend: Send + Sync {
    /// Generate one image. The request must carry an explicit aspect-ratio
    /// parameter and ask for both image and text modalities.
    ///
    /// # Errors
    ///
    /// `Error::InsufficientCredits` on HTTP 402 (or an equivalent body),
    /// `Error::ProviderUnavailable` on any other non-success status or a
    /// response missing the expected image payload.
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImage>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
