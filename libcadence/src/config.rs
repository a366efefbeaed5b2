//! Configuration management for Cadence
//!
//! Configuration is a plain TOML file merged once at load time with a small
//! set of environment variables for secrets. Components receive the resolved
//! config object at construction; nothing reads the environment afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Which AI text provider to use for content generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentProviderKind {
    Gemini,
    Anthropic,
}

/// Which image provider to use for image generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    Huggingface,
    Pollinations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub cron: CronConfig,
    pub ai: AiConfig,
    pub images: ImageConfig,
    pub publishing: PublishingConfig,
    pub twitter: TwitterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/cadence/cadence.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// Shared secret the trigger endpoints compare against
    /// `Authorization: Bearer <secret>`.
    pub secret: Option<String>,
    pub bind: String,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            secret: None,
            bind: "127.0.0.1:8686".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: ContentProviderKind,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub image_provider: ImageProviderKind,
    pub huggingface_token: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ContentProviderKind::Gemini,
            gemini_api_key: None,
            anthropic_api_key: None,
            image_provider: ImageProviderKind::Pollinations,
            huggingface_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Directory generated images are written into.
    pub dir: String,
    /// Public base URL prefixed onto stored image file names. When unset,
    /// stored images are referenced by filesystem path.
    pub base_url: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            dir: "~/.local/share/cadence/images".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// Maximum posts published per owner and platform in a trailing hour.
    pub max_posts_per_hour: u32,
    /// Failed posts are retried while `retry_count` stays under this bound.
    pub max_retries: u32,
    /// Failed posts older than this are no longer retried.
    pub retry_window_hours: u32,
    /// Batch size for one retry scan.
    pub retry_batch: u32,
    /// Batch size for opportunistic image backfill per publish scan.
    pub image_backfill_batch: u32,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            max_posts_per_hour: 5,
            max_retries: 3,
            retry_window_hours: 24,
            retry_batch: 10,
            image_backfill_batch: 5,
        }
    }
}

/// OAuth2 client used by the Twitter adapter's token refresh exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cron: CronConfig::default(),
            ai: AiConfig::default(),
            images: ImageConfig::default(),
            publishing: PublishingConfig::default(),
            twitter: TwitterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no config file exists yet.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Merge secrets from the environment into unset fields.
    fn apply_env_overrides(&mut self) {
        merge_env(&mut self.cron.secret, "CADENCE_CRON_SECRET");
        merge_env(&mut self.ai.gemini_api_key, "GEMINI_API_KEY");
        merge_env(&mut self.ai.anthropic_api_key, "ANTHROPIC_API_KEY");
        merge_env(&mut self.ai.huggingface_token, "HUGGINGFACE_TOKEN");
        merge_env(&mut self.twitter.client_id, "TWITTER_CLIENT_ID");
        merge_env(&mut self.twitter.client_secret, "TWITTER_CLIENT_SECRET");
    }

    /// The cron shared secret, required before any trigger endpoint may run.
    pub fn cron_secret(&self) -> Result<&str> {
        self.cron
            .secret
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("cron.secret".to_string()).into())
    }
}

fn merge_env(slot: &mut Option<String>, var: &str) {
    if slot.is_none() {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                *slot = Some(value);
            }
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CADENCE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("cadence").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.publishing.max_posts_per_hour, 5);
        assert_eq!(config.publishing.max_retries, 3);
        assert_eq!(config.publishing.retry_window_hours, 24);
        assert_eq!(config.ai.provider, ContentProviderKind::Gemini);
        assert_eq!(config.ai.image_provider, ImageProviderKind::Pollinations);
        assert!(config.cron.secret.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[database]
path = "/tmp/test.db"

[ai]
provider = "anthropic"
anthropic_api_key = "sk-test"

[publishing]
max_posts_per_hour = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.ai.provider, ContentProviderKind::Anthropic);
        assert_eq!(config.publishing.max_posts_per_hour, 2);
        // Unspecified sections keep their defaults.
        assert_eq!(config.publishing.max_retries, 3);
        assert_eq!(config.cron.bind, "127.0.0.1:8686");
    }

    #[test]
    fn test_cron_secret_missing_is_config_error() {
        let config = Config::default();
        let err = config.cron_secret().unwrap_err();
        assert!(format!("{}", err).contains("cron.secret"));
    }

    #[test]
    fn test_cron_secret_present() {
        let mut config = Config::default();
        config.cron.secret = Some("s3cret".to_string());
        assert_eq!(config.cron_secret().unwrap(), "s3cret");
    }

    #[test]
    fn test_provider_kind_parse() {
        let kind: ContentProviderKind = serde_json::from_str(r#""gemini""#).unwrap();
        assert_eq!(kind, ContentProviderKind::Gemini);

        let kind: ImageProviderKind = serde_json::from_str(r#""huggingface""#).unwrap();
        assert_eq!(kind, ImageProviderKind::Huggingface);
    }
}
