//! Locally synthesized placeholder images.
//!
//! When the image provider chain fails, the pipeline must still produce a
//! displayable image. Strategy A renders a small SVG (solid background in a
//! per-reason color, emoji label, keywords from the failed prompt) and
//! returns it as a base64 data URL. Strategy B, reached only if local
//! synthesis itself fails, is a static remote placeholder URL.

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::warn;

use illume_core::{defaults, Error};

/// Why the provider chain degraded to a placeholder. Each category gets a
/// distinct background color and emoji so operators can read failure modes
/// off a gallery at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    InsufficientCredits,
    ModelUnavailable,
    UndefinedProperties,
    GenericError,
}

impl FallbackReason {
    /// Stable identifier used in the `[Fallback: <reason>]` prompt prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::InsufficientCredits => "insufficient_credits",
            FallbackReason::ModelUnavailable => "model_unavailable",
            FallbackReason::UndefinedProperties => "undefined_properties",
            FallbackReason::GenericError => "generic_error",
        }
    }

    fn background_color(&self) -> &'static str {
        match self {
            FallbackReason::InsufficientCredits => "#FF6B6B",
            FallbackReason::ModelUnavailable => "#4ECDC4",
            FallbackReason::UndefinedProperties => "#45B7D1",
            FallbackReason::GenericError => "#96CEB4",
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            FallbackReason::InsufficientCredits => "💳",
            FallbackReason::ModelUnavailable => "🤖",
            FallbackReason::UndefinedProperties => "🛡️",
            FallbackReason::GenericError => "🔄",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FallbackReason::InsufficientCredits => "Credits Required",
            FallbackReason::ModelUnavailable => "Model Offline",
            FallbackReason::UndefinedProperties => "Invalid Response",
            FallbackReason::GenericError => "Fallback Mode",
        }
    }

    /// Classify a provider error into a placeholder category.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::InsufficientCredits(_) => FallbackReason::InsufficientCredits,
            Error::ProviderUnavailable(msg) => {
                let msg = msg.to_lowercase();
                if msg.contains("no image payload") || msg.contains("malformed") {
                    FallbackReason::UndefinedProperties
                } else if msg.contains("model") || msg.contains("404") || msg.contains("503") {
                    FallbackReason::ModelUnavailable
                } else {
                    FallbackReason::GenericError
                }
            }
            _ => FallbackReason::GenericError,
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix a prompt with its fallback label.
pub fn fallback_prompt(prompt: &str, reason: FallbackReason) -> String {
    format!("[Fallback: {}] {}", reason.as_str(), prompt)
}

/// Extract up to three display keywords from a failed prompt: alphanumeric
/// words longer than three characters, in order.
pub fn prompt_keywords(prompt: &str) -> Vec<String> {
    prompt
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| word.chars().count() >= defaults::PLACEHOLDER_MIN_KEYWORD_LEN)
        .take(defaults::PLACEHOLDER_MAX_KEYWORDS)
        .collect()
}

/// Escape characters that are special in XML text content.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the placeholder SVG and encode it as a data URL.
fn render_svg_data_url(prompt: &str, reason: FallbackReason) -> Result<String, std::fmt::Error> {
    let size = defaults::PLACEHOLDER_CANVAS_SIZE;
    let keywords = prompt_keywords(prompt);
    let keyword_line = if keywords.is_empty() {
        "Image".to_string()
    } else {
        escape_xml(&keywords.join(" "))
    };

    let mut svg = String::new();
    write!(
        svg,
        r#"<svg width="{size}" height="{size}" xmlns="http://www.w3.org/2000/svg">"#
    )?;
    write!(
        svg,
        r#"<rect width="100%" height="100%" fill="{}"/>"#,
        reason.background_color()
    )?;
    write!(
        svg,
        r##"<text x="50%" y="45%" font-family="Arial, sans-serif" font-size="28" fill="#FFFFFF" text-anchor="middle">{} {}</text>"##,
        reason.emoji(),
        reason.label()
    )?;
    write!(
        svg,
        r##"<text x="50%" y="58%" font-family="Arial, sans-serif" font-size="20" fill="#FFFFFF" text-anchor="middle">{}</text>"##,
        keyword_line
    )?;
    write!(svg, "</svg>")?;

    Ok(format!(
        "data:image/svg+xml;base64,{}",
        BASE64.encode(svg.as_bytes())
    ))
}

/// Produce a placeholder image for a failed generation.
///
/// Contract: never fails. Returns a data URL from local SVG synthesis, or
/// the static remote placeholder if synthesis itself errors.
pub fn placeholder_image(prompt: &str, reason: FallbackReason) -> String {
    match render_svg_data_url(prompt, reason) {
        Ok(url) => url,
        Err(e) => {
            warn!(
                subsystem = "pipeline",
                component = "fallback",
                fallback_reason = %reason,
                error = %e,
                "Local placeholder synthesis failed, using remote placeholder"
            );
            defaults::PLACEHOLDER_REMOTE_URL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_identifiers() {
        assert_eq!(
            FallbackReason::InsufficientCredits.as_str(),
            "insufficient_credits"
        );
        assert_eq!(FallbackReason::GenericError.as_str(), "generic_error");
    }

    #[test]
    fn test_reason_styling_is_distinct() {
        let reasons = [
            FallbackReason::InsufficientCredits,
            FallbackReason::ModelUnavailable,
            FallbackReason::UndefinedProperties,
            FallbackReason::GenericError,
        ];
        let colors: std::collections::HashSet<_> =
            reasons.iter().map(|r| r.background_color()).collect();
        assert_eq!(colors.len(), reasons.len());
    }

    #[test]
    fn test_from_error_classification() {
        assert_eq!(
            FallbackReason::from_error(&Error::InsufficientCredits("402".into())),
            FallbackReason::InsufficientCredits
        );
        assert_eq!(
            FallbackReason::from_error(&Error::ProviderUnavailable(
                "no image payload in response".into()
            )),
            FallbackReason::UndefinedProperties
        );
        assert_eq!(
            FallbackReason::from_error(&Error::ProviderUnavailable("status 503".into())),
            FallbackReason::ModelUnavailable
        );
        assert_eq!(
            FallbackReason::from_error(&Error::ProviderUnavailable("connection reset".into())),
            FallbackReason::GenericError
        );
    }

    #[test]
    fn test_prompt_keywords() {
        assert_eq!(
            prompt_keywords("a photorealistic sunset, over the mountains!"),
            vec!["photorealistic", "sunset", "over"]
        );
        assert!(prompt_keywords("a b c").is_empty());
    }

    #[test]
    fn test_fallback_prompt_prefix() {
        let prompt = fallback_prompt("artistic, sunset", FallbackReason::GenericError);
        assert_eq!(prompt, "[Fallback: generic_error] artistic, sunset");
        assert!(prompt.starts_with("[Fallback:"));
    }

    #[test]
    fn test_placeholder_is_svg_data_url() {
        let url = placeholder_image("a sunset prompt", FallbackReason::GenericError);
        assert!(url.starts_with("data:image/svg+xml;base64,"));

        let payload = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(BASE64.decode(payload).unwrap()).unwrap();
        assert!(svg.contains("Fallback Mode"));
        assert!(svg.contains("sunset"));
        assert!(svg.contains("#96CEB4"));
    }

    #[test]
    fn test_placeholder_keywords_cannot_inject_markup() {
        // Keyword extraction strips non-alphanumerics, so markup characters
        // never reach the SVG text node.
        let url = placeholder_image("<script>alert(1)</script> \"quoted\"", FallbackReason::GenericError);
        let payload = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(BASE64.decode(payload).unwrap()).unwrap();
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("scriptalert1script quoted"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b < c"), "a &amp; b &lt; c");
    }

    #[test]
    fn test_placeholder_empty_prompt_still_labeled() {
        let url = placeholder_image("", FallbackReason::ModelUnavailable);
        let payload = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(BASE64.decode(payload).unwrap()).unwrap();
        assert!(svg.contains("Image"));
        assert!(svg.contains("Model Offline"));
    }
}
