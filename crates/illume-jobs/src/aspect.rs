//! Heuristic aspect-ratio selection.

use illume_core::{AspectRatio, ImageStyle};

/// Choose an aspect ratio from prompt text and style.
///
/// Ordered substring rules; the first matching rule wins:
/// portraits and people are vertical, landscapes are cinematic, products
/// are square, stories are mobile-vertical, artistic and minimalist styles
/// default to square, and square is the final default.
pub fn select_aspect_ratio(prompt: &str, style: ImageStyle) -> AspectRatio {
    let prompt = prompt.to_lowercase();

    if ["portrait", "person", "face", "headshot"]
        .iter()
        .any(|k| prompt.contains(k))
    {
        return AspectRatio::Portrait3x4;
    }

    if ["landscape", "panorama", "skyline", "horizon"]
        .iter()
        .any(|k| prompt.contains(k))
    {
        return AspectRatio::Wide16x9;
    }

    if ["product", "object", "item", "tool"]
        .iter()
        .any(|k| prompt.contains(k))
    {
        return AspectRatio::Square1x1;
    }

    if ["story", "social", "mobile"].iter().any(|k| prompt.contains(k)) {
        return AspectRatio::Tall9x16;
    }

    if matches!(style, ImageStyle::Artistic | ImageStyle::Minimalist) {
        return AspectRatio::Square1x1;
    }

    AspectRatio::Square1x1
}
