//! Platform adapters
//!
//! One adapter per social platform, behind a shared trait. Adapters receive
//! the already-composed outbound message plus the post (for its image) and
//! the owner's stored connection; they return the platform's post id and
//! surface the platform's own error message verbatim on failure.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::TwitterConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::{Platform, PlatformConnection, Post};

pub mod facebook;
pub mod linkedin;
pub mod twitter;

// Mock adapter is available for all builds (not just tests) to support
// integration tests
pub mod mock;

/// A platform-specific publish capability.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter publishes to
    fn kind(&self) -> Platform;

    /// Publish the composed message (plus the post's image, if any) on
    /// behalf of the connected account.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` for credential problems,
    /// `PlatformError::Network` for transport failures, and
    /// `PlatformError::Posting` carrying the platform's own error message
    /// for rejected publishes.
    async fn publish(
        &self,
        post: &Post,
        message: &str,
        connection: &PlatformConnection,
    ) -> Result<String>;
}

/// Adapter lookup keyed by platform.
///
/// Platforms without a registered adapter are unsupported: the dispatcher
/// fails such posts immediately without a network call. Instagram is
/// deliberately absent from the standard set.
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Box<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// The production adapter set: Facebook, LinkedIn, Twitter.
    pub fn standard(http: reqwest::Client, db: Database, twitter: &TwitterConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(facebook::FacebookAdapter::new(http.clone())));
        registry.register(Box::new(linkedin::LinkedInAdapter::new(http.clone())));
        registry.register(Box::new(twitter::TwitterAdapter::new(
            http,
            db,
            twitter.clone(),
        )));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn PlatformAdapter> {
        self.adapters.get(&platform).map(|a| a.as_ref())
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;

    #[test]
    fn test_registry_lookup() {
        let mut registry = AdapterRegistry::new();
        registry.register(Box::new(MockAdapter::success(Platform::Twitter)));

        assert!(registry.get(Platform::Twitter).is_some());
        assert!(registry.get(Platform::Instagram).is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = AdapterRegistry::new();
        registry.register(Box::new(MockAdapter::success(Platform::Twitter)));
        registry.register(Box::new(MockAdapter::failure(Platform::Twitter, "nope")));

        // Latest registration wins; only one adapter per platform.
        assert_eq!(registry.adapters.len(), 1);
    }
}
