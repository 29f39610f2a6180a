//! Prompt construction for image generation.
//!
//! Two strategies: an *enhanced* prompt synthesized by a text-completion
//! provider from a content analysis of the note, and a *basic* prompt
//! assembled locally with no network access. The builder always returns a
//! usable prompt within the character budget; any enhanced-path failure
//! degrades to the basic strategy silently (logged, not surfaced).

use std::sync::Arc;

use tracing::{debug, warn};

use illume_core::{
    defaults, ContentType, ImageStyle, Mood, Note, TextCompletionBackend,
};

/// Immutable prompt-building input, validated once at pipeline entry.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub title: String,
    pub content: String,
    pub style: ImageStyle,
    pub reference_image_urls: Vec<String>,
}

impl PromptContext {
    /// Build a context from a note. Empty content falls back to the note's
    /// recorded default prompt; reference images are carried only when the
    /// request asked to reuse them.
    pub fn from_note(note: &Note, style: ImageStyle, use_existing_images: bool) -> Self {
        Self {
            title: note.title.clone().unwrap_or_default(),
            content: note.prompt_source().to_string(),
            style,
            reference_image_urls: if use_existing_images {
                note.image_urls()
            } else {
                Vec::new()
            },
        }
    }
}

/// Ordered keyword groups for content classification. First match wins.
const CONTENT_TYPE_KEYWORDS: &[(ContentType, &[&str])] = &[
    (
        ContentType::Meeting,
        &["meeting", "réunion", "notes", "agenda"],
    ),
    (
        ContentType::Concept,
        &["idea", "idée", "concept", "brainstorm"],
    ),
    (ContentType::Task, &["task", "tâche", "todo", "action"]),
    (ContentType::Project, &["project", "projet", "plan"]),
    (
        ContentType::Personal,
        &["personal", "personnel", "diary", "journal"],
    ),
    (
        ContentType::Recipe,
        &["recipe", "recette", "food", "cuisine"],
    ),
    (ContentType::Travel, &["travel", "voyage", "trip"]),
    (
        ContentType::Technical,
        &["code", "programming", "développement"],
    ),
];

/// Ordered keyword groups for mood classification. First match wins.
const MOOD_KEYWORDS: &[(Mood, &[&str])] = &[
    (
        Mood::Positive,
        &["excited", "amazing", "great", "wonderful", "fantastic"],
    ),
    (
        Mood::Urgent,
        &["urgent", "important", "critical", "deadline"],
    ),
    (Mood::Calm, &["calm", "peaceful", "relaxed", "meditation"]),
    (
        Mood::Creative,
        &["creative", "artistic", "design", "inspiration"],
    ),
    (
        Mood::Serious,
        &["problem", "issue", "difficult", "challenge"],
    ),
];

/// Classify note content into a coarse category via ordered keyword match.
pub fn classify_content_type(title: &str, content: &str) -> ContentType {
    let text = format!("{} {}", title, content).to_lowercase();
    CONTENT_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(content_type, _)| *content_type)
        .unwrap_or_default()
}

/// Classify note content into a coarse mood via ordered keyword match.
pub fn classify_mood(content: &str) -> Mood {
    let text = content.to_lowercase();
    MOOD_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(mood, _)| *mood)
        .unwrap_or_default()
}

/// Visual descriptors for a (content type, style) combination.
pub fn suggest_visual_elements(content_type: ContentType, style: ImageStyle) -> &'static str {
    match (content_type, style) {
        (ContentType::Meeting, ImageStyle::Photorealistic) => {
            "conference room, professional lighting, modern space"
        }
        (ContentType::Meeting, ImageStyle::Artistic) => {
            "abstract collaboration, geometric shapes, corporate colors"
        }
        (ContentType::Meeting, ImageStyle::Minimalist) => {
            "simple meeting space, white background, clean lines"
        }
        (ContentType::Concept, ImageStyle::Photorealistic) => {
            "lightbulb, brainstorming whiteboard, bright workspace"
        }
        (ContentType::Concept, ImageStyle::Artistic) => {
            "abstract idea visualization, flowing shapes, vibrant colors"
        }
        (ContentType::Concept, ImageStyle::Minimalist) => {
            "simple icon, clean background, focused composition"
        }
        (ContentType::Travel, ImageStyle::Photorealistic) => {
            "scenic destination, natural lighting, landscape view"
        }
        (ContentType::Travel, ImageStyle::Artistic) => {
            "stylized map, travel icons, wanderlust aesthetic"
        }
        (ContentType::Travel, ImageStyle::Minimalist) => {
            "simple travel symbol, clean design, neutral tones"
        }
        (ContentType::Recipe, ImageStyle::Photorealistic) => {
            "food photography, natural lighting, appetizing presentation"
        }
        (ContentType::Recipe, ImageStyle::Artistic) => {
            "illustrated ingredients, cookbook style, warm colors"
        }
        (ContentType::Recipe, ImageStyle::Minimalist) => {
            "simple food icon, clean plating, white background"
        }
        _ => "professional composition, good lighting, clear details",
    }
}

/// Truncate to at most `max` characters, on a character boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Build a prompt locally with no network access.
///
/// Always returns a non-empty string within the character budget.
pub fn generate_basic_prompt(ctx: &PromptContext) -> String {
    let subject = if ctx.title.trim().is_empty() {
        defaults::PROMPT_GENERIC_SUBJECT
    } else {
        ctx.title.trim()
    };
    let details = if ctx.content.trim().is_empty() {
        defaults::PROMPT_GENERIC_DETAILS.to_string()
    } else {
        truncate_chars(ctx.content.trim(), defaults::PROMPT_CONTENT_EXCERPT_CHARS)
    };

    let prompt = format!(
        "{}, {}, {}, professional lighting",
        ctx.style.prompt_phrase(),
        subject,
        details
    );
    truncate_chars(&prompt, defaults::PROMPT_MAX_CHARS)
}

/// Content analysis summary fed to the enhanced strategy.
pub fn analyze_content(ctx: &PromptContext) -> String {
    let content_type = classify_content_type(&ctx.title, &ctx.content);
    let mood = classify_mood(&ctx.content);
    let visual = suggest_visual_elements(content_type, ctx.style);
    format!(
        "Type: {}, Mood: {}, Visual: {}",
        content_type.as_str(),
        mood.as_str(),
        visual
    )
}

const SYSTEM_INSTRUCTIONS: &str = "You are an expert in prompt engineering for image generation models.\n\
STRICT RULES:\n\
- MAXIMUM 180 characters\n\
- Respond in ENGLISH only\n\
- Use the content analysis provided\n\
- Include specific visual details\n\
- Avoid abstract concepts\n\
- Format: \"style, subject, composition, lighting, details\"\n\
\n\
Example: \"photorealistic portrait, young professional, clean background, soft natural lighting, high detail\"";

/// Prompt builder with an optional enhanced (provider-backed) strategy.
///
/// `None` for the completion backend means no credential was configured;
/// the builder then always uses the basic strategy without attempting any
/// network call.
pub struct PromptBuilder {
    completion: Option<Arc<dyn TextCompletionBackend>>,
}

impl PromptBuilder {
    pub fn new(completion: Option<Arc<dyn TextCompletionBackend>>) -> Self {
        Self { completion }
    }

    /// Build a prompt for the given context.
    ///
    /// Contract: never fails, never returns an empty string, and the result
    /// is within [`defaults::PROMPT_MAX_CHARS`].
    pub async fn build(&self, ctx: &PromptContext) -> String {
        let Some(ref backend) = self.completion else {
            debug!(
                subsystem = "pipeline",
                component = "prompt_builder",
                "No completion backend configured, using basic prompt"
            );
            return generate_basic_prompt(ctx);
        };

        match self.build_enhanced(backend.as_ref(), ctx).await {
            Some(prompt) => prompt,
            None => generate_basic_prompt(ctx),
        }
    }

    /// Enhanced strategy. `None` means "fall back to basic".
    async fn build_enhanced(
        &self,
        backend: &dyn TextCompletionBackend,
        ctx: &PromptContext,
    ) -> Option<String> {
        let analysis = analyze_content(ctx);
        let user = format!(
            "Content analysis: {}\n\n\
             Note title: \"{}\"\n\
             Note content: \"{}\"\n\
             Requested style: {}\n\
             {}\n\
             Generate an optimized prompt in English, max {} characters.",
            analysis,
            ctx.title,
            ctx.content,
            ctx.style,
            if ctx.reference_image_urls.is_empty() {
                String::new()
            } else {
                format!("Existing images: {}", ctx.reference_image_urls.len())
            },
            defaults::PROMPT_MAX_CHARS,
        );

        let completion = match backend.complete(SYSTEM_INSTRUCTIONS, &user).await {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "prompt_builder",
                    model = backend.model_name(),
                    error = %e,
                    "Prompt optimization failed, falling back to basic prompt"
                );
                return None;
            }
        };

        let cleaned: String = completion
            .chars()
            .filter(|c| *c != '"' && *c != '\'')
            .collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            warn!(
                subsystem = "pipeline",
                component = "prompt_builder",
                "Empty optimized prompt, falling back to basic prompt"
            );
            return None;
        }

        let prompt = if cleaned.chars().count() > defaults::PROMPT_MAX_CHARS {
            let mut truncated = truncate_chars(cleaned, defaults::PROMPT_MAX_CHARS - 3);
            truncated.push_str("...");
            truncated
        } else {
            cleaned.to_string()
        };

        debug!(
            subsystem = "pipeline",
            component = "prompt_builder",
            prompt_len = prompt.len(),
            "Optimized prompt ready"
        );
        Some(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(title: &str, content: &str, style: ImageStyle) -> PromptContext {
        PromptContext {
            title: title.to_string(),
            content: content.to_string(),
            style,
            reference_image_urls: Vec::new(),
        }
    }

    #[test]
    fn test_classification_is_order_sensitive() {
        // Matches both the meeting and concept groups; meeting is checked first.
        assert_eq!(
            classify_content_type("", "team meeting to brainstorm ideas"),
            ContentType::Meeting
        );
    }

    #[test]
    fn test_classification_uses_title_and_content() {
        assert_eq!(
            classify_content_type("Trip to Lisbon", ""),
            ContentType::Travel
        );
        assert_eq!(
            classify_content_type("", "weekend recipe for pasta"),
            ContentType::Recipe
        );
    }

    #[test]
    fn test_classification_defaults_to_general() {
        assert_eq!(classify_content_type("", "xyzzy"), ContentType::General);
    }

    #[test]
    fn test_mood_ordering_and_default() {
        assert_eq!(classify_mood("urgent and amazing"), Mood::Positive);
        assert_eq!(classify_mood("critical deadline"), Mood::Urgent);
        assert_eq!(classify_mood("nothing special"), Mood::Neutral);
    }

    #[test]
    fn test_visual_elements_fallback() {
        assert_eq!(
            suggest_visual_elements(ContentType::Technical, ImageStyle::Cartoon),
            "professional composition, good lighting, clear details"
        );
        assert_eq!(
            suggest_visual_elements(ContentType::Meeting, ImageStyle::Photorealistic),
            "conference room, professional lighting, modern space"
        );
    }

    #[test]
    fn test_basic_prompt_never_empty_and_within_budget() {
        let cases = [
            ctx("", "", ImageStyle::Photorealistic),
            ctx("A title", "", ImageStyle::Artistic),
            ctx("", "Some content here", ImageStyle::Cartoon),
            ctx(
                "Long",
                &"content ".repeat(100),
                ImageStyle::Minimalist,
            ),
        ];
        for c in &cases {
            let prompt = generate_basic_prompt(c);
            assert!(!prompt.is_empty());
            assert!(prompt.chars().count() <= defaults::PROMPT_MAX_CHARS);
        }
    }

    #[test]
    fn test_basic_prompt_uses_generic_subject_for_untitled() {
        let prompt = generate_basic_prompt(&ctx("", "mountains", ImageStyle::Photorealistic));
        assert!(prompt.contains("abstract concept"));
        assert!(prompt.starts_with("photorealistic, high quality, detailed"));
    }

    #[test]
    fn test_analyze_content_format() {
        let analysis = analyze_content(&ctx(
            "Team meeting",
            "agenda for tomorrow",
            ImageStyle::Artistic,
        ));
        assert_eq!(
            analysis,
            "Type: meeting, Mood: neutral, Visual: abstract collaboration, geometric shapes, corporate colors"
        );
    }

    #[tokio::test]
    async fn test_builder_without_backend_uses_basic() {
        let builder = PromptBuilder::new(None);
        let prompt = builder
            .build(&ctx("Sunset", "over the mountains", ImageStyle::Artistic))
            .await;
        assert!(prompt.starts_with("artistic, creative, stylized"));
        assert!(prompt.contains("Sunset"));
    }

    #[test]
    fn test_truncate_chars_is_boundary_safe() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
