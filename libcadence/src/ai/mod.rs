//! AI content and image generation
//!
//! Two capability traits, each with concrete HTTP-backed providers selected
//! through an explicit tagged config variant at construction time. Provider
//! responses pass through a parsing chain that never fails (see [`parse`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AiConfig, ContentProviderKind, ImageProviderKind};
use crate::error::{ConfigError, Result};
use crate::types::Platform;

pub mod anthropic;
pub mod gemini;
pub mod image;
pub mod parse;

// Mock providers are available for all builds to support integration tests
pub mod mock;

/// Input to one content-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub topic: String,
    pub notes: Option<String>,
    pub platform: Platform,
    pub brand_voice: Option<String>,
}

/// Output of one content-generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content: String,
    pub hashtags: Vec<String>,
    pub image_prompt: Option<String>,
}

/// A text provider that turns a topic into platform-tailored post content.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent>;

    /// Lowercase provider identifier (e.g. "gemini", "anthropic")
    fn name(&self) -> &str;
}

/// An image provider that turns a prompt into raw image bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;

    fn name(&self) -> &str;
}

/// Build the configured content generator.
pub fn build_content_generator(config: &AiConfig) -> Result<Box<dyn ContentGenerator>> {
    match config.provider {
        ContentProviderKind::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingField("ai.gemini_api_key".to_string()))?;
            Ok(Box::new(gemini::GeminiGenerator::new(api_key)))
        }
        ContentProviderKind::Anthropic => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingField("ai.anthropic_api_key".to_string()))?;
            Ok(Box::new(anthropic::AnthropicGenerator::new(api_key)))
        }
    }
}

/// Build the configured image generator. Providers that can fail at runtime
/// are wrapped with a Pollinations failover, matching how the pipeline is
/// expected to keep producing images when the primary quota runs out.
pub fn build_image_generator(config: &AiConfig) -> Result<Box<dyn ImageGenerator>> {
    match config.image_provider {
        ImageProviderKind::Huggingface => {
            let token = config
                .huggingface_token
                .clone()
                .ok_or_else(|| ConfigError::MissingField("ai.huggingface_token".to_string()))?;
            Ok(Box::new(image::FailoverImageGenerator::new(
                Box::new(image::HuggingFaceImageGenerator::new(token)),
                Box::new(image::PollinationsImageGenerator::new()),
            )))
        }
        ImageProviderKind::Pollinations => {
            Ok(Box::new(image::PollinationsImageGenerator::new()))
        }
    }
}

/// Render the generation prompt for one topic and platform.
///
/// The instructions pin the response to a bare JSON object; the parsing
/// chain still tolerates providers that wrap it in prose or code fences.
pub(crate) fn build_prompt(request: &GenerationRequest) -> String {
    let platform = request.platform;
    let mut prompt = format!(
        "You are a social media content expert. Generate a {} post about the following topic.\n\n\
         TOPIC: {}\n",
        platform, request.topic
    );

    if let Some(notes) = request.notes.as_deref().filter(|n| !n.is_empty()) {
        prompt.push_str(&format!("ADDITIONAL CONTEXT: {}\n", notes));
    }
    if let Some(voice) = request.brand_voice.as_deref().filter(|v| !v.is_empty()) {
        prompt.push_str(&format!("BRAND VOICE: {}\n", voice));
    }

    prompt.push_str(&format!(
        "\nREQUIREMENTS:\n\
         - Maximum {} characters for the post content\n\
         - Include up to {} relevant hashtags\n\
         - Make it engaging and professional\n",
        platform.text_limit(),
        platform.hashtag_limit()
    ));

    let tone = match platform {
        Platform::Linkedin => "Use a professional, thought-leadership tone",
        Platform::Twitter => "Be concise and punchy, include 1-2 emojis",
        Platform::Facebook => "Be conversational and encourage engagement",
        Platform::Instagram => "Focus on visual storytelling, use emojis generously",
    };
    prompt.push_str(&format!("- {}\n", tone));

    prompt.push_str(
        "\nRESPOND IN THIS EXACT JSON FORMAT:\n\
         {\n\
         \x20 \"content\": \"Your post content here without hashtags\",\n\
         \x20 \"hashtags\": [\"hashtag1\", \"hashtag2\", \"hashtag3\"],\n\
         \x20 \"imagePrompt\": \"A description for generating an accompanying image\"\n\
         }\n\n\
         Respond ONLY with valid JSON, no additional text.",
    );

    prompt
}
