//! Stored image handling
//!
//! Generated images land in a directory on disk, referenced from posts by
//! URL (or path, when no public base URL is configured). Bucket-style remote
//! storage stays behind the same trait.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::ImageConfig;
use crate::error::Result;

/// Persists generated image bytes and hands back the reference to store on
/// the post.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, post_id: &str, bytes: &[u8]) -> Result<String>;
}

/// File-based store rooted at a configured directory.
pub struct LocalImageStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Self {
        let root = shellexpand::tilde(&config.dir).to_string();
        Self::new(root, config.base_url.clone())
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, post_id: &str, bytes: &[u8]) -> Result<String> {
        let file_name = format!("{}.png", post_id);
        let path = self.root.join(&file_name);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;

        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), file_name)),
            None => Ok(path.to_string_lossy().into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_writes_file_and_returns_path() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(tmp.path().join("images"), None);

        let reference = store.store("post-1", &[1, 2, 3]).await.unwrap();
        assert!(reference.ends_with("post-1.png"));

        let written = std::fs::read(tmp.path().join("images/post-1.png")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_store_uses_base_url_when_configured() {
        let tmp = TempDir::new().unwrap();
        let store = LocalImageStore::new(
            tmp.path(),
            Some("https://img.example.com/cadence/".to_string()),
        );

        let reference = store.store("post-2", &[0]).await.unwrap();
        assert_eq!(reference, "https://img.example.com/cadence/post-2.png");
    }
}
