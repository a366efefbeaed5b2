//! Image generation providers
//!
//! Both providers return raw image bytes for a prompt. The failover wrapper
//! keeps the publishing path supplied with images when the primary provider's
//! quota or availability gives out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::warn;

use crate::error::{AiError, Result};

use super::ImageGenerator;

const HUGGINGFACE_URL: &str =
    "https://router.huggingface.co/hf-inference/models/black-forest-labs/FLUX.1-schnell";
const POLLINATIONS_URL: &str = "https://image.pollinations.ai/";

/// FLUX.1-schnell via the Hugging Face inference router.
pub struct HuggingFaceImageGenerator {
    http: Client,
    token: String,
}

#[derive(Serialize)]
struct HuggingFaceRequest<'a> {
    inputs: &'a str,
}

impl HuggingFaceImageGenerator {
    pub fn new(token: String) -> Self {
        Self {
            http: Client::new(),
            token,
        }
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(HUGGINGFACE_URL)
            .bearer_auth(&self.token)
            .json(&HuggingFaceRequest { inputs: prompt })
            .send()
            .await
            .map_err(|e| AiError::Http(format!("Hugging Face request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(
                AiError::Provider(format!("Hugging Face error ({}): {}", status, detail)).into(),
            );
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AiError::Http(format!("Hugging Face body unreadable: {}", e)))?;

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// Pollinations.ai, the zero-config backup provider.
pub struct PollinationsImageGenerator {
    http: Client,
}

impl PollinationsImageGenerator {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for PollinationsImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerator for PollinationsImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let mut url = reqwest::Url::parse(POLLINATIONS_URL)
            .map_err(|e| AiError::Http(format!("Pollinations URL invalid: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AiError::Http("Pollinations URL cannot be a base".to_string()))?
            .push("prompt")
            .push(prompt);
        url.query_pairs_mut()
            .append_pair("width", "1024")
            .append_pair("height", "576")
            .append_pair("nologo", "true");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AiError::Http(format!("Pollinations request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AiError::Provider(format!(
                "Pollinations error ({})",
                response.status()
            ))
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AiError::Http(format!("Pollinations body unreadable: {}", e)))?;

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "pollinations"
    }
}

/// Tries the primary provider, falling back once on any failure.
pub struct FailoverImageGenerator {
    primary: Box<dyn ImageGenerator>,
    fallback: Box<dyn ImageGenerator>,
}

impl FailoverImageGenerator {
    pub fn new(primary: Box<dyn ImageGenerator>, fallback: Box<dyn ImageGenerator>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ImageGenerator for FailoverImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        match self.primary.generate(prompt).await {
            Ok(bytes) => Ok(bytes),
            Err(primary_err) => {
                warn!(
                    provider = self.primary.name(),
                    error = %primary_err,
                    "image provider failed, trying {}",
                    self.fallback.name()
                );
                match self.fallback.generate(prompt).await {
                    Ok(bytes) => Ok(bytes),
                    // Surface the original failure when the backup dies too.
                    Err(fallback_err) => {
                        warn!(
                            provider = self.fallback.name(),
                            error = %fallback_err,
                            "fallback image provider also failed"
                        );
                        Err(primary_err)
                    }
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockImageGenerator;

    #[tokio::test]
    async fn test_failover_uses_primary_when_healthy() {
        let primary = MockImageGenerator::success("primary", vec![1, 2, 3]);
        let fallback = MockImageGenerator::success("fallback", vec![9]);
        let fallback_calls = fallback.call_count_handle();

        let generator = FailoverImageGenerator::new(Box::new(primary), Box::new(fallback));
        let bytes = generator.generate("a rocket").await.unwrap();

        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(*fallback_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failover_falls_back_on_error() {
        let primary = MockImageGenerator::failure("primary", "quota exhausted");
        let fallback = MockImageGenerator::success("fallback", vec![9]);

        let generator = FailoverImageGenerator::new(Box::new(primary), Box::new(fallback));
        let bytes = generator.generate("a rocket").await.unwrap();

        assert_eq!(bytes, vec![9]);
    }

    #[tokio::test]
    async fn test_failover_reports_primary_error_when_both_fail() {
        let primary = MockImageGenerator::failure("primary", "quota exhausted");
        let fallback = MockImageGenerator::failure("fallback", "offline");

        let generator = FailoverImageGenerator::new(Box::new(primary), Box::new(fallback));
        let err = generator.generate("a rocket").await.unwrap_err();

        assert!(format!("{}", err).contains("quota exhausted"));
    }
}
