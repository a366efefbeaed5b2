//! Core types for Cadence

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A social platform a post can be published to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Linkedin,
    Twitter,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Linkedin => "linkedin",
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
        }
    }

    /// Maximum characters of post text the platform accepts.
    pub fn text_limit(&self) -> usize {
        match self {
            Self::Facebook => 63_206,
            Self::Linkedin => 3_000,
            Self::Twitter => 280,
            Self::Instagram => 2_200,
        }
    }

    /// Maximum number of hashtags worth attaching on the platform.
    pub fn hashtag_limit(&self) -> usize {
        match self {
            Self::Twitter => 5,
            _ => 30,
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "linkedin" => Ok(Self::Linkedin),
            "twitter" | "x" => Ok(Self::Twitter),
            "instagram" => Ok(Self::Instagram),
            _ => Err(format!("Unknown platform: '{}'", s)),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How often a pipeline produces content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::BiWeekly => "bi-weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "bi-weekly" | "biweekly" => Ok(Self::BiWeekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(format!("Unknown frequency: '{}'", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a generated post.
///
/// Created as `Generated` (review required) or `Scheduled` (auto-publish).
/// Only the publish dispatcher moves a post to `Published` or `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Pending,
    Generated,
    Approved,
    Scheduled,
    Published,
    Failed,
    Skipped,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Generated => "generated",
            Self::Approved => "approved",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "generated" => Ok(Self::Generated),
            "approved" => Ok(Self::Approved),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown post status: '{}'", s)),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a topic inside a pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Pending,
    Generating,
    Generated,
    Skipped,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Generated => "generated",
            Self::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for TopicStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "generated" => Ok(Self::Generated),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown topic status: '{}'", s)),
        }
    }
}

/// A recurring content-generation schedule owned by one user.
///
/// `next_run_at` is seeded at creation and afterwards advanced only by the
/// pipeline runner; it never moves backwards for a fixed frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Target platforms, in configured posting order.
    pub platforms: Vec<Platform>,
    pub frequency: Frequency,
    /// Preferred "HH:MM" posting time. Advisory; seeded into the initial
    /// `next_run_at` by the creator, not enforced by the recurrence math.
    pub post_time: String,
    pub timezone: String,
    pub review_required: bool,
    pub is_active: bool,
    pub last_run_at: Option<i64>,
    pub next_run_at: Option<i64>,
    pub created_at: i64,
}

/// A content idea queued inside one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub pipeline_id: String,
    pub title: String,
    pub notes: Option<String>,
    pub is_evergreen: bool,
    pub recycle_interval_days: Option<i64>,
    pub last_used_at: Option<i64>,
    /// Processing order within the pipeline; ties broken by creation order.
    pub sort_order: i64,
    pub status: TopicStatus,
    pub created_at: i64,
}

impl Topic {
    pub fn new(pipeline_id: &str, title: &str, sort_order: i64, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pipeline_id: pipeline_id.to_string(),
            title: title.to_string(),
            notes: None,
            is_evergreen: false,
            recycle_interval_days: None,
            last_used_at: None,
            sort_order,
            status: TopicStatus::Pending,
            created_at: now,
        }
    }
}

/// One platform-specific generated artifact derived from a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub topic_id: String,
    pub pipeline_id: String,
    pub user_id: String,
    pub platform: Platform,
    pub content: String,
    pub hashtags: Vec<String>,
    pub image_url: Option<String>,
    pub image_prompt: Option<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<i64>,
    pub published_at: Option<i64>,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: i64,
}

/// Stored OAuth credentials authorizing posting to one platform.
///
/// Read-only to the engine, except that the Twitter adapter writes back
/// refreshed tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConnection {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<i64>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn test_platform_serde_lowercase() {
        let json = serde_json::to_string(&Platform::Linkedin).unwrap();
        assert_eq!(json, r#""linkedin""#);

        let parsed: Platform = serde_json::from_str(r#""twitter""#).unwrap();
        assert_eq!(parsed, Platform::Twitter);
    }

    #[test]
    fn test_platform_unknown() {
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_limits() {
        assert_eq!(Platform::Twitter.text_limit(), 280);
        assert_eq!(Platform::Twitter.hashtag_limit(), 5);
        assert_eq!(Platform::Linkedin.text_limit(), 3_000);
        assert_eq!(Platform::Facebook.hashtag_limit(), 30);
    }

    #[test]
    fn test_frequency_round_trip() {
        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::BiWeekly,
            Frequency::Monthly,
        ] {
            let parsed: Frequency = frequency.as_str().parse().unwrap();
            assert_eq!(parsed, frequency);
        }
    }

    #[test]
    fn test_frequency_bi_weekly_serde() {
        let json = serde_json::to_string(&Frequency::BiWeekly).unwrap();
        assert_eq!(json, r#""bi-weekly""#);

        let parsed: Frequency = serde_json::from_str(r#""bi-weekly""#).unwrap();
        assert_eq!(parsed, Frequency::BiWeekly);
    }

    #[test]
    fn test_post_status_round_trip() {
        for status in [
            PostStatus::Draft,
            PostStatus::Pending,
            PostStatus::Generated,
            PostStatus::Approved,
            PostStatus::Scheduled,
            PostStatus::Published,
            PostStatus::Failed,
            PostStatus::Skipped,
        ] {
            let parsed: PostStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_topic_status_round_trip() {
        for status in [
            TopicStatus::Pending,
            TopicStatus::Generating,
            TopicStatus::Generated,
            TopicStatus::Skipped,
        ] {
            let parsed: TopicStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_topic_new_defaults() {
        let topic = Topic::new("pipe-1", "Launch Day", 3, 1_700_000_000);

        assert!(Uuid::parse_str(&topic.id).is_ok());
        assert_eq!(topic.pipeline_id, "pipe-1");
        assert_eq!(topic.title, "Launch Day");
        assert_eq!(topic.sort_order, 3);
        assert_eq!(topic.status, TopicStatus::Pending);
        assert_eq!(topic.last_used_at, None);
        assert!(!topic.is_evergreen);
    }
}
