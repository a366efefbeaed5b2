//! Twitter/X platform adapter
//!
//! Posts through the v2 tweet endpoint. This is the only adapter with a
//! write side effect: short-lived OAuth2 tokens are refreshed ahead of
//! expiry and persisted back onto the connection record. Images go through
//! the legacy v1.1 media upload endpoint; a failed upload degrades the tweet
//! to text-only.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::TwitterConfig;
use crate::db::Database;
use crate::error::{PlatformError, Result};
use crate::types::{Platform, PlatformConnection, Post};

use super::PlatformAdapter;

const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";
const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

/// Refresh when the token expires within this leeway.
const TOKEN_REFRESH_LEEWAY_SECS: i64 = 5 * 60;

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: Option<TweetData>,
    errors: Option<Vec<TweetError>>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TweetError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: Option<String>,
}

pub struct TwitterAdapter {
    http: Client,
    db: Database,
    oauth: TwitterConfig,
}

impl TwitterAdapter {
    pub fn new(http: Client, db: Database, oauth: TwitterConfig) -> Self {
        Self { http, db, oauth }
    }

    /// Exchange the stored refresh token for a fresh access token and
    /// persist the rotated credentials.
    async fn refresh_token(&self, connection: &PlatformConnection) -> Result<String> {
        let refresh_token = connection.refresh_token.as_deref().ok_or_else(|| {
            PlatformError::Authentication("No refresh token available for Twitter".to_string())
        })?;

        let (client_id, client_secret) = match (&self.oauth.client_id, &self.oauth.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => {
                return Err(PlatformError::Authentication(
                    "Twitter client credentials not configured".to_string(),
                )
                .into())
            }
        };

        let basic = BASE64.encode(format!("{}:{}", client_id, client_secret));

        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Twitter token refresh failed: {}", e)))?;

        let body: TokenResponse = response.json().await.map_err(|e| {
            PlatformError::Network(format!("Twitter token response unreadable: {}", e))
        })?;

        if let Some(error) = body.error {
            let detail = body.error_description.unwrap_or(error);
            return Err(PlatformError::Authentication(detail).into());
        }

        let access_token = body.access_token.ok_or_else(|| {
            PlatformError::Authentication("Twitter refresh returned no access token".to_string())
        })?;

        let expires_at = chrono::Utc::now().timestamp() + body.expires_in.unwrap_or(7_200);
        let new_refresh = body.refresh_token.as_deref().or(Some(refresh_token));

        self.db
            .update_connection_tokens(&connection.id, &access_token, new_refresh, expires_at)
            .await?;

        debug!(connection_id = %connection.id, "refreshed Twitter token");
        Ok(access_token)
    }

    /// Upload image bytes via the legacy endpoint; returns the media id.
    async fn upload_media(&self, access_token: &str, image_url: &str) -> Result<String> {
        let image = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("image fetch failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| PlatformError::Network(format!("image fetch unreadable: {}", e)))?;

        let response = self
            .http
            .post(MEDIA_UPLOAD_URL)
            .bearer_auth(access_token)
            .form(&[("media_data", BASE64.encode(&image))])
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Twitter media upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PlatformError::Posting(format!(
                "Twitter media upload rejected ({}): {}",
                status, detail
            ))
            .into());
        }

        let body: MediaUploadResponse = response.json().await.map_err(|e| {
            PlatformError::Network(format!("Twitter media response unreadable: {}", e))
        })?;

        body.media_id_string.ok_or_else(|| {
            PlatformError::Posting("Twitter media response missing media id".to_string()).into()
        })
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn kind(&self) -> Platform {
        Platform::Twitter
    }

    async fn publish(
        &self,
        post: &Post,
        message: &str,
        connection: &PlatformConnection,
    ) -> Result<String> {
        let now = chrono::Utc::now().timestamp();

        let access_token = match connection.token_expires_at {
            Some(expires_at) if expires_at - now < TOKEN_REFRESH_LEEWAY_SECS => {
                self.refresh_token(connection).await?
            }
            _ => connection.access_token.clone(),
        };

        let media_id = match &post.image_url {
            Some(image_url) => match self.upload_media(&access_token, image_url).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "Twitter media upload failed, posting text-only");
                    None
                }
            },
            None => None,
        };

        let body = match &media_id {
            Some(id) => json!({ "text": message, "media": { "media_ids": [id] } }),
            None => json!({ "text": message }),
        };

        let response = self
            .http
            .post(TWEETS_URL)
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Twitter request failed: {}", e)))?;

        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(format!("Twitter response unreadable: {}", e)))?;

        let parsed: TweetResponse = serde_json::from_str(&text).unwrap_or(TweetResponse {
            data: None,
            errors: None,
        });

        if let Some(errors) = parsed.errors {
            if let Some(first) = errors.first() {
                return Err(
                    PlatformError::Posting(format!("Twitter API Error: {}", first.message)).into(),
                );
            }
        }

        parsed
            .data
            .map(|d| d.id)
            .ok_or_else(|| {
                PlatformError::Posting(format!("Twitter unexpected response: {}", text)).into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tweet_response_success_shape() {
        let body: TweetResponse =
            serde_json::from_str(r#"{"data": {"id": "1790000000000000001", "text": "hi"}}"#)
                .unwrap();
        assert_eq!(body.data.unwrap().id, "1790000000000000001");
    }

    #[test]
    fn test_tweet_response_error_shape() {
        let body: TweetResponse = serde_json::from_str(
            r#"{"errors": [{"message": "You are not allowed to create a Tweet with duplicate content."}]}"#,
        )
        .unwrap();
        assert_eq!(
            body.errors.unwrap()[0].message,
            "You are not allowed to create a Tweet with duplicate content."
        );
    }

    #[test]
    fn test_token_response_shapes() {
        let ok: TokenResponse = serde_json::from_str(
            r#"{"access_token": "t2", "refresh_token": "r2", "expires_in": 7200, "token_type": "bearer"}"#,
        )
        .unwrap();
        assert_eq!(ok.access_token.as_deref(), Some("t2"));
        assert_eq!(ok.expires_in, Some(7200));

        let err: TokenResponse = serde_json::from_str(
            r#"{"error": "invalid_request", "error_description": "Value passed for the token was invalid."}"#,
        )
        .unwrap();
        assert_eq!(
            err.error_description.as_deref(),
            Some("Value passed for the token was invalid.")
        );
    }

    #[test]
    fn test_refresh_leeway_boundary() {
        let now = 1_700_000_000;
        // Expiring in 4 minutes: refresh. Expiring in 10: keep the token.
        assert!(now + 240 - now < TOKEN_REFRESH_LEEWAY_SECS);
        assert!(now + 600 - now >= TOKEN_REFRESH_LEEWAY_SECS);
    }
}
