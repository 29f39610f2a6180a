//! Core data models for illume.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// NOTES
// =============================================================================

/// A user-owned note with optional generated images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub content: Option<String>,
    /// Ordered tag list, lowercased on write.
    pub tags: Vec<String>,
    /// Attached images, oldest first. At most [`crate::defaults::MAX_NOTE_IMAGES`].
    pub images: Vec<NoteImage>,
    /// Derived from `images` at query time: true iff at least one image.
    pub has_images: bool,
    /// Substituted prompt recorded when the note was created/updated with
    /// empty content.
    pub default_prompt: Option<String>,
    /// Last prompt used for image generation, or the in-progress marker
    /// while a generation task is running.
    pub generated_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Text the prompt builder should work from: content, falling back to
    /// the recorded default prompt for empty notes.
    pub fn prompt_source(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(self.default_prompt.as_deref())
            .unwrap_or("")
    }

    /// URLs of attached images, oldest first.
    pub fn image_urls(&self) -> Vec<String> {
        self.images.iter().map(|i| i.url.clone()).collect()
    }
}

/// One attached image. The stored-object id and its durable URL travel in a
/// single record so the two can never drift out of lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteImage {
    pub id: Uuid,
    pub object_id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Request for creating a new note.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request for updating an existing note.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Filters for listing/searching notes.
#[derive(Debug, Clone, Default)]
pub struct ListNotesRequest {
    /// Case-insensitive substring query over title and content.
    pub query: Option<String>,
    /// Restrict to notes carrying this tag.
    pub tag: Option<String>,
    /// Restrict to notes with at least one image.
    pub with_images: bool,
}

// =============================================================================
// IMAGE GENERATION
// =============================================================================

/// Requested visual style for a generated image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Photorealistic,
    Artistic,
    Cartoon,
    Minimalist,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Photorealistic => "photorealistic",
            ImageStyle::Artistic => "artistic",
            ImageStyle::Cartoon => "cartoon",
            ImageStyle::Minimalist => "minimalist",
        }
    }

    /// Style phrase used by the basic prompt strategy.
    pub fn prompt_phrase(&self) -> &'static str {
        match self {
            ImageStyle::Photorealistic => "photorealistic, high quality, detailed",
            ImageStyle::Artistic => "artistic, creative, stylized",
            ImageStyle::Cartoon => "cartoon style, colorful, animated",
            ImageStyle::Minimalist => "minimalist, clean, simple",
        }
    }
}

impl std::fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width:height ratio requested from the image provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square1x1,
    #[serde(rename = "16:9")]
    Wide16x9,
    #[serde(rename = "9:16")]
    Tall9x16,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square1x1 => "1:1",
            AspectRatio::Wide16x9 => "16:9",
            AspectRatio::Tall9x16 => "9:16",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral request to generate an image for a note. Not persisted; a log
/// record is written once the attempt completes.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub owner_id: Uuid,
    pub note_id: Uuid,
    pub style: ImageStyle,
    /// Pins the aspect ratio; `None` lets the selector choose from the prompt.
    pub aspect_ratio: Option<AspectRatio>,
    /// Reuse existing attached image URLs as style reference.
    pub use_existing_images: bool,
}

impl GenerationRequest {
    pub fn new(owner_id: Uuid, note_id: Uuid) -> Self {
        Self {
            owner_id,
            note_id,
            style: ImageStyle::default(),
            aspect_ratio: None,
            use_existing_images: false,
        }
    }
}

/// Result payload returned to the caller of a generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub image_url: String,
    /// Prompt actually used; prefixed with `[Fallback: <reason>]` when the
    /// provider chain bottomed out in a placeholder.
    pub prompt: String,
    pub image_id: Uuid,
    /// Best-effort quota hint, clamped at zero.
    pub generations_remaining: i64,
}

/// One audit row per generation attempt, used for daily quota counting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub note_id: Uuid,
    /// Calendar date bucket for daily counting.
    pub date: NaiveDate,
    pub prompt: String,
    pub image_url: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a generation record.
#[derive(Debug, Clone)]
pub struct NewGenerationRecord {
    pub owner_id: Uuid,
    pub note_id: Uuid,
    pub date: NaiveDate,
    pub prompt: String,
    pub image_url: String,
    pub success: bool,
}

// =============================================================================
// CONTENT ANALYSIS
// =============================================================================

/// Coarse content category used to pick visual elements for a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Meeting,
    Concept,
    Task,
    Project,
    Personal,
    Recipe,
    Travel,
    Technical,
    #[default]
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Meeting => "meeting",
            ContentType::Concept => "concept",
            ContentType::Task => "task",
            ContentType::Project => "project",
            ContentType::Personal => "personal",
            ContentType::Recipe => "recipe",
            ContentType::Travel => "travel",
            ContentType::Technical => "technical",
            ContentType::General => "general",
        }
    }
}

/// Coarse mood classification of note content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Positive,
    Urgent,
    Calm,
    Creative,
    Serious,
    #[default]
    Neutral,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Positive => "positive",
            Mood::Urgent => "urgent",
            Mood::Calm => "calm",
            Mood::Creative => "creative",
            Mood::Serious => "serious",
            Mood::Neutral => "neutral",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_style_default() {
        assert_eq!(ImageStyle::default(), ImageStyle::Photorealistic);
    }

    #[test]
    fn test_image_style_serde_lowercase() {
        let json = serde_json::to_string(&ImageStyle::Minimalist).unwrap();
        assert_eq!(json, "\"minimalist\"");
        let back: ImageStyle = serde_json::from_str("\"artistic\"").unwrap();
        assert_eq!(back, ImageStyle::Artistic);
    }

    #[test]
    fn test_aspect_ratio_serde_rename() {
        let json = serde_json::to_string(&AspectRatio::Portrait3x4).unwrap();
        assert_eq!(json, "\"3:4\"");
        let back: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(back, AspectRatio::Wide16x9);
    }

    #[test]
    fn test_aspect_ratio_display_matches_wire_format() {
        for ratio in [
            AspectRatio::Square1x1,
            AspectRatio::Wide16x9,
            AspectRatio::Tall9x16,
            AspectRatio::Portrait3x4,
            AspectRatio::Landscape4x3,
        ] {
            let wire = serde_json::to_string(&ratio).unwrap();
            assert_eq!(wire, format!("\"{}\"", ratio));
        }
    }

    #[test]
    fn test_note_prompt_source_prefers_content() {
        let note = sample_note(Some("Sunset over the mountains"), Some("fallback"));
        assert_eq!(note.prompt_source(), "Sunset over the mountains");
    }

    #[test]
    fn test_note_prompt_source_falls_back_on_blank_content() {
        let note = sample_note(Some("   "), Some("fallback prompt"));
        assert_eq!(note.prompt_source(), "fallback prompt");
    }

    #[test]
    fn test_note_prompt_source_empty_when_nothing_set() {
        let note = sample_note(None, None);
        assert_eq!(note.prompt_source(), "");
    }

    fn sample_note(content: Option<&str>, default_prompt: Option<&str>) -> Note {
        Note {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: None,
            content: content.map(String::from),
            tags: vec![],
            images: vec![],
            has_images: false,
            default_prompt: default_prompt.map(String::from),
            generated_prompt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
