//! Tolerant extraction of generated content from model output
//!
//! Models asked for "only valid JSON" still wrap their answer in prose,
//! markdown fences, or trailing commentary. Extraction runs an ordered chain
//! of pure strategies and always produces *something*; worst case the raw
//! text is kept as best-effort content. A parse failure never crosses the
//! generation boundary.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;

use super::GeneratedContent;

/// Fallback content length when the response isn't JSON at all.
const PLAIN_TEXT_LIMIT: usize = 500;

/// Extract `GeneratedContent` from raw model output. Infallible.
pub fn parse_generated(text: &str) -> GeneratedContent {
    const STRATEGIES: &[(&str, fn(&str) -> Option<GeneratedContent>)] = &[
        ("direct", parse_direct),
        ("fenced", parse_fenced),
        ("braced", parse_braced),
        ("fields", parse_fields),
    ];

    for (name, strategy) in STRATEGIES {
        if let Some(content) = strategy(text) {
            debug!(strategy = name, "parsed generated content");
            return content;
        }
    }

    debug!("no JSON found in response, keeping plain text");
    fallback_plain(text)
}

/// Loose mirror of the JSON shape the prompt asks for.
#[derive(Deserialize)]
struct RawGenerated {
    content: Option<String>,
    hashtags: Option<Vec<String>>,
    #[serde(alias = "imagePrompt")]
    image_prompt: Option<String>,
}

impl From<RawGenerated> for GeneratedContent {
    fn from(raw: RawGenerated) -> Self {
        Self {
            content: raw.content.unwrap_or_default(),
            hashtags: raw.hashtags.unwrap_or_default(),
            image_prompt: raw.image_prompt.filter(|p| !p.is_empty()),
        }
    }
}

/// The whole response is the JSON object.
fn parse_direct(text: &str) -> Option<GeneratedContent> {
    serde_json::from_str::<RawGenerated>(text.trim())
        .ok()
        .map(Into::into)
}

/// The object is inside a markdown code fence, possibly with prose around it.
fn parse_fenced(text: &str) -> Option<GeneratedContent> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    parse_direct(&body[..close])
}

/// Scan for the first balanced `{...}` block and parse it. Handles braces
/// inside string literals and escape sequences.
fn parse_braced(text: &str) -> Option<GeneratedContent> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return parse_direct(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Last structured resort: pull individual fields out with regexes. Catches
/// responses whose JSON is broken overall but whose fields survive intact.
fn parse_fields(text: &str) -> Option<GeneratedContent> {
    static CONTENT_RE: OnceLock<Regex> = OnceLock::new();
    static HASHTAGS_RE: OnceLock<Regex> = OnceLock::new();
    static IMAGE_RE: OnceLock<Regex> = OnceLock::new();

    let content_re = CONTENT_RE.get_or_init(|| {
        Regex::new(r#""content"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("content regex")
    });
    let hashtags_re = HASHTAGS_RE
        .get_or_init(|| Regex::new(r#""hashtags"\s*:\s*(\[[^\]]*\])"#).expect("hashtags regex"));
    let image_re = IMAGE_RE.get_or_init(|| {
        Regex::new(r#""image_?[Pp]rompt"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("image regex")
    });

    let content = content_re
        .captures(text)
        .and_then(|c| unescape_json_string(c.get(1)?.as_str()))?;

    let hashtags = hashtags_re
        .captures(text)
        .and_then(|c| serde_json::from_str::<Vec<String>>(c.get(1)?.as_str()).ok())
        .unwrap_or_default();

    let image_prompt = image_re
        .captures(text)
        .and_then(|c| unescape_json_string(c.get(1)?.as_str()))
        .filter(|p| !p.is_empty());

    Some(GeneratedContent {
        content,
        hashtags,
        image_prompt,
    })
}

/// Decode a raw (still escaped) JSON string body.
fn unescape_json_string(raw: &str) -> Option<String> {
    serde_json::from_str(&format!("\"{}\"", raw)).ok()
}

/// Nothing parseable: keep the head of the raw text as content.
fn fallback_plain(text: &str) -> GeneratedContent {
    GeneratedContent {
        content: text.chars().take(PLAIN_TEXT_LIMIT).collect(),
        hashtags: Vec::new(),
        image_prompt: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{"content": "Big news today! 🚀", "hashtags": ["launch", "startup"], "imagePrompt": "a rocket at dawn"}"#;

    fn expected() -> GeneratedContent {
        GeneratedContent {
            content: "Big news today! 🚀".to_string(),
            hashtags: vec!["launch".to_string(), "startup".to_string()],
            image_prompt: Some("a rocket at dawn".to_string()),
        }
    }

    #[test]
    fn test_direct_json() {
        assert_eq!(parse_generated(RAW), expected());
    }

    #[test]
    fn test_direct_json_with_whitespace() {
        assert_eq!(parse_generated(&format!("\n  {}\n", RAW)), expected());
    }

    #[test]
    fn test_snake_case_image_prompt_alias() {
        let text = r#"{"content": "hi", "hashtags": [], "image_prompt": "a thing"}"#;
        let parsed = parse_generated(text);
        assert_eq!(parsed.image_prompt.as_deref(), Some("a thing"));
    }

    #[test]
    fn test_fenced_block_with_trailing_prose() {
        // A fenced response with prose after the closing fence must parse the
        // same as the raw JSON.
        let text = format!(
            "Here is your post:\n```json\n{}\n```\nLet me know if you'd like changes!",
            RAW
        );
        assert_eq!(parse_generated(&text), expected());
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let text = format!("```\n{}\n```", RAW);
        assert_eq!(parse_generated(&text), expected());
    }

    #[test]
    fn test_braced_scan_with_surrounding_prose() {
        let text = format!("Sure thing! {} Hope that works.", RAW);
        assert_eq!(parse_generated(&text), expected());
    }

    #[test]
    fn test_braced_scan_ignores_braces_in_strings() {
        let text = r#"{"content": "curly {braces} inside", "hashtags": []}"#;
        let parsed = parse_generated(text);
        assert_eq!(parsed.content, "curly {braces} inside");
    }

    #[test]
    fn test_field_extraction_from_broken_json() {
        // Trailing comma makes the object invalid everywhere, but the fields
        // themselves survive.
        let text = r#"{"content": "Still usable", "hashtags": ["ok"],}"#;
        let parsed = parse_generated(text);
        assert_eq!(parsed.content, "Still usable");
        assert_eq!(parsed.hashtags, vec!["ok"]);
    }

    #[test]
    fn test_field_extraction_unescapes() {
        let text = r#"broken { "content": "line one\nline \"two\"", "#;
        let parsed = parse_generated(text);
        assert_eq!(parsed.content, "line one\nline \"two\"");
    }

    #[test]
    fn test_plain_text_fallback() {
        let text = "I'm sorry, I can only help with social media posts.";
        let parsed = parse_generated(text);
        assert_eq!(parsed.content, text);
        assert!(parsed.hashtags.is_empty());
        assert_eq!(parsed.image_prompt, None);
    }

    #[test]
    fn test_plain_text_fallback_truncates() {
        let text = "x".repeat(2_000);
        let parsed = parse_generated(&text);
        assert_eq!(parsed.content.chars().count(), PLAIN_TEXT_LIMIT);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed = parse_generated(r#"{"content": "just text"}"#);
        assert_eq!(parsed.content, "just text");
        assert!(parsed.hashtags.is_empty());
        assert_eq!(parsed.image_prompt, None);
    }

    #[test]
    fn test_never_panics_on_garbage() {
        for text in ["", "{", "{{{\"", "```", "```json\n", "{\"content\": }"] {
            let _ = parse_generated(text);
        }
    }
}
