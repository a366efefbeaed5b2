//! LinkedIn platform adapter
//!
//! Creates UGC shares as either a person or an organization depending on the
//! shape of the stored account id. Image posts run a three-step media flow
//! (register upload, binary upload, attach); a media failure degrades the
//! share to text-only rather than losing the post.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{PlatformError, Result};
use crate::types::{Platform, PlatformConnection, Post};

use super::PlatformAdapter;

const LINKEDIN_API_URL: &str = "https://api.linkedin.com/v2";
const RESTLI_VERSION: &str = "2.0.0";

/// Organization pages carry numeric ids; member ids are opaque strings.
fn author_urn(account_id: &str) -> String {
    if !account_id.is_empty() && account_id.chars().all(|c| c.is_ascii_digit()) {
        format!("urn:li:organization:{}", account_id)
    } else {
        format!("urn:li:person:{}", account_id)
    }
}

#[derive(Debug, Deserialize)]
struct UgcResponse {
    id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadValue {
    asset: String,
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: UploadMechanism,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    media_upload: MediaUploadRequest,
}

#[derive(Debug, Deserialize)]
struct MediaUploadRequest {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

pub struct LinkedInAdapter {
    http: Client,
    api_url: String,
}

impl LinkedInAdapter {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            api_url: LINKEDIN_API_URL.to_string(),
        }
    }

    /// Register, fetch, and upload the post's image; returns the asset URN.
    async fn upload_image(
        &self,
        connection: &PlatformConnection,
        author: &str,
        image_url: &str,
    ) -> Result<String> {
        // Step 1: register the upload slot.
        let register_body = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": author,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let response = self
            .http
            .post(format!("{}/assets?action=registerUpload", self.api_url))
            .bearer_auth(&connection.access_token)
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .json(&register_body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("LinkedIn register failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PlatformError::Posting(format!(
                "LinkedIn media registration rejected ({}): {}",
                status, detail
            ))
            .into());
        }

        let registered: RegisterUploadResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(format!("LinkedIn register unreadable: {}", e)))?;

        // Step 2: fetch the image bytes.
        let image = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("image fetch failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| PlatformError::Network(format!("image fetch unreadable: {}", e)))?;

        // Step 3: push the binary to the returned upload URL.
        let upload = self
            .http
            .put(&registered.value.upload_mechanism.media_upload.upload_url)
            .bearer_auth(&connection.access_token)
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("LinkedIn upload failed: {}", e)))?;

        if !upload.status().is_success() {
            return Err(PlatformError::Posting(format!(
                "LinkedIn media upload rejected ({})",
                upload.status()
            ))
            .into());
        }

        Ok(registered.value.asset)
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn kind(&self) -> Platform {
        Platform::Linkedin
    }

    async fn publish(
        &self,
        post: &Post,
        message: &str,
        connection: &PlatformConnection,
    ) -> Result<String> {
        let account_id = connection.account_id.as_deref().ok_or_else(|| {
            PlatformError::Authentication("LinkedIn connection has no account id".to_string())
        })?;
        let author = author_urn(account_id);

        let asset = match &post.image_url {
            Some(image_url) => match self.upload_image(connection, &author, image_url).await {
                Ok(asset) => Some(asset),
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "LinkedIn media upload failed, posting text-only");
                    None
                }
            },
            None => None,
        };

        let share_content = match &asset {
            Some(asset) => json!({
                "shareCommentary": { "text": message },
                "shareMediaCategory": "IMAGE",
                "media": [{ "status": "READY", "media": asset }]
            }),
            None => json!({
                "shareCommentary": { "text": message },
                "shareMediaCategory": "NONE"
            }),
        };

        let body = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let response = self
            .http
            .post(format!("{}/ugcPosts", self.api_url))
            .bearer_auth(&connection.access_token)
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("LinkedIn request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(format!("LinkedIn response unreadable: {}", e)))?;

        let parsed: UgcResponse = serde_json::from_str(&text).unwrap_or(UgcResponse {
            id: None,
            message: None,
        });

        if !status.is_success() {
            // Prefer LinkedIn's own message field, else the raw body.
            let detail = parsed.message.unwrap_or(text);
            return Err(PlatformError::Posting(detail).into());
        }

        parsed
            .id
            .ok_or_else(|| PlatformError::Posting(format!("LinkedIn response missing id: {}", text)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_account_is_organization() {
        assert_eq!(author_urn("78123456"), "urn:li:organization:78123456");
    }

    #[test]
    fn test_opaque_account_is_person() {
        assert_eq!(author_urn("aBcD3fGh"), "urn:li:person:aBcD3fGh");
        assert_eq!(author_urn("12a34"), "urn:li:person:12a34");
    }

    #[test]
    fn test_empty_account_is_person() {
        assert_eq!(author_urn(""), "urn:li:person:");
    }

    #[test]
    fn test_register_upload_response_shape() {
        let body: RegisterUploadResponse = serde_json::from_str(
            r#"{
                "value": {
                    "asset": "urn:li:digitalmediaAsset:C5522AQ",
                    "uploadMechanism": {
                        "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest": {
                            "uploadUrl": "https://api.linkedin.com/mediaUpload/xyz"
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(body.value.asset, "urn:li:digitalmediaAsset:C5522AQ");
        assert!(body
            .value
            .upload_mechanism
            .media_upload
            .upload_url
            .starts_with("https://"));
    }

    #[test]
    fn test_ugc_error_message_surfaced() {
        let body: UgcResponse = serde_json::from_str(
            r#"{"message": "ugcPosts resource does not exist", "status": 404}"#,
        )
        .unwrap();
        assert_eq!(body.message.as_deref(), Some("ugcPosts resource does not exist"));
    }
}
