//! Anthropic content provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

use super::{build_prompt, parse::parse_generated, ContentGenerator, GeneratedContent, GenerationRequest};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Option<Vec<ContentBlock>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

pub struct AnthropicGenerator {
    http: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl ContentGenerator for AnthropicGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent> {
        let prompt = build_prompt(request);

        let body = MessagesRequest {
            model: ANTHROPIC_MODEL.to_string(),
            max_tokens: 1024,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Http(format!("Anthropic request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(
                AiError::Provider(format!("Anthropic API error ({}): {}", status, detail)).into(),
            );
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AiError::Http(format!("Anthropic response unreadable: {}", e)))?;

        let text = parsed
            .content
            .and_then(|mut blocks| blocks.drain(..).next())
            .and_then(|block| block.text)
            .ok_or(AiError::EmptyResponse)?;

        Ok(parse_generated(&text))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
