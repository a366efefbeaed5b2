//! Mock AI providers for testing
//!
//! Configurable stand-ins for the content and image capabilities. Requests
//! are recorded behind shared handles so tests can assert on what the
//! dispatcher actually asked for, without network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{AiError, Result};

use super::{ContentGenerator, GeneratedContent, GenerationRequest, ImageGenerator};

/// Mock content generator with canned output or a canned failure.
pub struct MockContentGenerator {
    response: GeneratedContent,
    error: Option<String>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockContentGenerator {
    /// Succeeds with platform-tagged content and a fixed hashtag set.
    pub fn success() -> Self {
        Self::with_content(GeneratedContent {
            content: "Generated content".to_string(),
            hashtags: vec!["launch".to_string(), "startup".to_string()],
            image_prompt: Some("a rocket at dawn".to_string()),
        })
    }

    pub fn with_content(response: GeneratedContent) -> Self {
        Self {
            response,
            error: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every call with the given message.
    pub fn failure(error: &str) -> Self {
        Self {
            response: GeneratedContent::default(),
            error: Some(error.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the recorded requests; stays valid after the mock is
    /// boxed into a runner.
    pub fn requests_handle(&self) -> Arc<Mutex<Vec<GenerationRequest>>> {
        self.requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(error) = &self.error {
            return Err(AiError::Provider(error.clone()).into());
        }

        let mut response = self.response.clone();
        response.content = format!("{} for {}", response.content, request.platform);
        Ok(response)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock image generator returning fixed bytes or a fixed failure.
pub struct MockImageGenerator {
    name: String,
    bytes: Vec<u8>,
    error: Option<String>,
    calls: Arc<Mutex<usize>>,
}

impl MockImageGenerator {
    pub fn success(name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            bytes,
            error: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failure(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            bytes: Vec::new(),
            error: Some(error.to_string()),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count_handle(&self) -> Arc<Mutex<usize>> {
        self.calls.clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap() += 1;

        if let Some(error) = &self.error {
            return Err(AiError::Provider(error.clone()).into());
        }

        Ok(self.bytes.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn request() -> GenerationRequest {
        GenerationRequest {
            topic: "Launch Day".to_string(),
            notes: None,
            platform: Platform::Twitter,
            brand_voice: None,
        }
    }

    #[tokio::test]
    async fn test_mock_content_success_records_requests() {
        let generator = MockContentGenerator::success();

        let generated = generator.generate(&request()).await.unwrap();
        assert_eq!(generated.content, "Generated content for twitter");
        assert_eq!(generated.hashtags, vec!["launch", "startup"]);

        assert_eq!(generator.request_count(), 1);
        let recorded = generator.requests_handle();
        assert_eq!(recorded.lock().unwrap()[0].topic, "Launch Day");
    }

    #[tokio::test]
    async fn test_mock_content_failure() {
        let generator = MockContentGenerator::failure("model overloaded");

        let err = generator.generate(&request()).await.unwrap_err();
        assert!(format!("{}", err).contains("model overloaded"));
        assert_eq!(generator.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_image_generator() {
        let generator = MockImageGenerator::success("mock", vec![0xFF, 0xD8]);
        let bytes = generator.generate("a rocket").await.unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8]);
        assert_eq!(*generator.call_count_handle().lock().unwrap(), 1);
    }
}
