//! Mock platform adapter for testing
//!
//! Records every publish invocation behind a shared handle so tests can
//! verify exactly which posts reached a platform (and which never did),
//! without credentials or network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::types::{Platform, PlatformConnection, Post};

use super::PlatformAdapter;

/// One recorded publish invocation.
#[derive(Debug, Clone)]
pub struct PublishCall {
    pub post_id: String,
    pub message: String,
    pub account_id: Option<String>,
}

pub struct MockAdapter {
    kind: Platform,
    succeeds: bool,
    error: Option<String>,
    calls: Arc<Mutex<Vec<PublishCall>>>,
}

impl MockAdapter {
    /// An adapter that accepts every publish.
    pub fn success(kind: Platform) -> Self {
        Self {
            kind,
            succeeds: true,
            error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An adapter that rejects every publish with the given message.
    pub fn failure(kind: Platform, error: &str) -> Self {
        Self {
            kind,
            succeeds: false,
            error: Some(error.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the recorded calls; stays valid after the adapter is
    /// boxed into a registry.
    pub fn call_log(&self) -> Arc<Mutex<Vec<PublishCall>>> {
        self.calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn kind(&self) -> Platform {
        self.kind
    }

    async fn publish(
        &self,
        post: &Post,
        message: &str,
        connection: &PlatformConnection,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(PublishCall {
            post_id: post.id.clone(),
            message: message.to_string(),
            account_id: connection.account_id.clone(),
        });

        if self.succeeds {
            Ok(format!("{}:mock-{}", self.kind, Uuid::new_v4()))
        } else {
            let error = self
                .error
                .clone()
                .unwrap_or_else(|| "Mock publish failed".to_string());
            Err(PlatformError::Posting(error).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostStatus;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            topic_id: "t".to_string(),
            pipeline_id: "p".to_string(),
            user_id: "user-1".to_string(),
            platform: Platform::Twitter,
            content: "hello".to_string(),
            hashtags: vec![],
            image_url: None,
            image_prompt: None,
            status: PostStatus::Scheduled,
            scheduled_for: None,
            published_at: None,
            platform_post_id: None,
            error_message: None,
            retry_count: 0,
            created_at: 0,
        }
    }

    fn connection() -> PlatformConnection {
        PlatformConnection {
            id: "conn-1".to_string(),
            user_id: "user-1".to_string(),
            platform: Platform::Twitter,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            account_id: Some("acct-9".to_string()),
            account_name: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_mock_success_records_call() {
        let adapter = MockAdapter::success(Platform::Twitter);

        let id = adapter
            .publish(&post("post-1"), "hello #launch", &connection())
            .await
            .unwrap();

        assert!(id.starts_with("twitter:mock-"));
        assert_eq!(adapter.call_count(), 1);

        let calls = adapter.call_log();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].post_id, "post-1");
        assert_eq!(calls[0].message, "hello #launch");
        assert_eq!(calls[0].account_id.as_deref(), Some("acct-9"));
    }

    #[tokio::test]
    async fn test_mock_failure_surfaces_message() {
        let adapter = MockAdapter::failure(Platform::Facebook, "(#200) Permissions error");

        let err = adapter
            .publish(&post("post-1"), "hello", &connection())
            .await
            .unwrap_err();

        assert!(format!("{}", err).contains("(#200) Permissions error"));
        assert_eq!(adapter.call_count(), 1);
    }
}
