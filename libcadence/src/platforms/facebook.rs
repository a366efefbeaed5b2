//! Facebook platform adapter
//!
//! Publishes to the connected Page's feed via the Graph API, switching to
//! the photo endpoint when the post carries an image URL.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::types::{Platform, PlatformConnection, Post};

use super::PlatformAdapter;

const FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, Deserialize)]
struct GraphResponse {
    id: Option<String>,
    /// The photo endpoint reports the resulting feed post separately.
    post_id: Option<String>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

pub struct FacebookAdapter {
    http: Client,
    graph_url: String,
}

impl FacebookAdapter {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            graph_url: FACEBOOK_GRAPH_URL.to_string(),
        }
    }

    async fn send(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Facebook request failed: {}", e)))?;

        let body: GraphResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(format!("Facebook response unreadable: {}", e)))?;

        if let Some(error) = body.error {
            return Err(PlatformError::Posting(error.message).into());
        }

        body.post_id
            .or(body.id)
            .ok_or_else(|| PlatformError::Posting("Facebook response missing post id".to_string()).into())
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn kind(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(
        &self,
        post: &Post,
        message: &str,
        connection: &PlatformConnection,
    ) -> Result<String> {
        let page_id = connection.account_id.as_deref().ok_or_else(|| {
            PlatformError::Authentication("Facebook connection has no page id".to_string())
        })?;
        let token = connection.access_token.as_str();

        let image_url = post
            .image_url
            .as_deref()
            .filter(|url| url.starts_with("http"));

        if let Some(image_url) = image_url {
            let url = format!("{}/{}/photos", self.graph_url, page_id);
            self.send(&url, &[("url", image_url), ("caption", message), ("access_token", token)])
                .await
        } else {
            let url = format!("{}/{}/feed", self.graph_url, page_id);
            self.send(&url, &[("message", message), ("access_token", token)])
                .await
        }
    }
}
