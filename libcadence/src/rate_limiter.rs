//! Rate limiting for outbound publishing
//!
//! Caps how many posts one owner may publish to one platform inside a
//! trailing one-hour window. A limited attempt is a refusal, not a failure:
//! the post stays scheduled and a later scan picks it up again.

use crate::db::Database;
use crate::error::Result;
use crate::types::Platform;

pub const DEFAULT_MAX_POSTS_PER_HOUR: u32 = 5;
const WINDOW_SECS: i64 = 3_600;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { published_in_window: u32 },
}

pub struct RateLimiter {
    max_per_hour: u32,
}

impl RateLimiter {
    pub fn new(max_per_hour: u32) -> Self {
        Self { max_per_hour }
    }

    /// Check whether (owner, platform) may publish at `now`.
    ///
    /// Counts already-published posts in the trailing window. The check
    /// itself records nothing; only an actual publish raises the count.
    pub async fn check(
        &self,
        db: &Database,
        user_id: &str,
        platform: Platform,
        now: i64,
    ) -> Result<RateDecision> {
        let published_in_window = db
            .count_published_since(user_id, platform, now - WINDOW_SECS)
            .await?;

        if published_in_window >= self.max_per_hour {
            Ok(RateDecision::Limited {
                published_in_window,
            })
        } else {
            Ok(RateDecision::Allowed)
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POSTS_PER_HOUR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frequency, Pipeline, Post, PostStatus, Topic};
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path.to_string_lossy()).await.unwrap();
        (temp_dir, db)
    }

    async fn seed_published(db: &Database, user_id: &str, platform: Platform, published_at: i64) {
        let pipeline = Pipeline {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: "p".to_string(),
            platforms: vec![platform],
            frequency: Frequency::Daily,
            post_time: "09:00".to_string(),
            timezone: "UTC".to_string(),
            review_required: false,
            is_active: true,
            last_run_at: None,
            next_run_at: Some(published_at),
            created_at: published_at,
        };
        db.create_pipeline(&pipeline).await.unwrap();
        let topic = Topic::new(&pipeline.id, "t", 1, published_at);
        db.create_topic(&topic).await.unwrap();

        let post = Post {
            id: Uuid::new_v4().to_string(),
            topic_id: topic.id,
            pipeline_id: pipeline.id,
            user_id: user_id.to_string(),
            platform,
            content: "x".to_string(),
            hashtags: vec![],
            image_url: None,
            image_prompt: None,
            status: PostStatus::Published,
            scheduled_for: None,
            published_at: Some(published_at),
            platform_post_id: Some("remote-1".to_string()),
            error_message: None,
            retry_count: 0,
            created_at: published_at,
        };
        db.create_post(&post).await.unwrap();
    }

    #[tokio::test]
    async fn test_allows_under_limit() {
        let (_tmp, db) = setup_test_db().await;
        let limiter = RateLimiter::new(5);
        let now = 1_700_000_000;

        for _ in 0..4 {
            seed_published(&db, "user-1", Platform::Twitter, now - 100).await;
        }

        let decision = limiter
            .check(&db, "user-1", Platform::Twitter, now)
            .await
            .unwrap();
        assert_eq!(decision, RateDecision::Allowed);
    }

    #[tokio::test]
    async fn test_limits_at_threshold() {
        let (_tmp, db) = setup_test_db().await;
        let limiter = RateLimiter::new(5);
        let now = 1_700_000_000;

        for _ in 0..5 {
            seed_published(&db, "user-1", Platform::Twitter, now - 100).await;
        }

        let decision = limiter
            .check(&db, "user-1", Platform::Twitter, now)
            .await
            .unwrap();
        assert_eq!(
            decision,
            RateDecision::Limited {
                published_in_window: 5
            }
        );
    }

    #[tokio::test]
    async fn test_window_slides_past_old_posts() {
        let (_tmp, db) = setup_test_db().await;
        let limiter = RateLimiter::new(5);
        let now = 1_700_000_000;

        // Five posts just over an hour old no longer count.
        for _ in 0..5 {
            seed_published(&db, "user-1", Platform::Twitter, now - 3_700).await;
        }

        let decision = limiter
            .check(&db, "user-1", Platform::Twitter, now)
            .await
            .unwrap();
        assert_eq!(decision, RateDecision::Allowed);
    }

    #[tokio::test]
    async fn test_platforms_counted_independently() {
        let (_tmp, db) = setup_test_db().await;
        let limiter = RateLimiter::new(5);
        let now = 1_700_000_000;

        for _ in 0..5 {
            seed_published(&db, "user-1", Platform::Twitter, now - 100).await;
        }

        let decision = limiter
            .check(&db, "user-1", Platform::Facebook, now)
            .await
            .unwrap();
        assert_eq!(decision, RateDecision::Allowed);
    }

    #[tokio::test]
    async fn test_users_counted_independently() {
        let (_tmp, db) = setup_test_db().await;
        let limiter = RateLimiter::new(5);
        let now = 1_700_000_000;

        for _ in 0..5 {
            seed_published(&db, "user-1", Platform::Twitter, now - 100).await;
        }

        let decision = limiter
            .check(&db, "user-2", Platform::Twitter, now)
            .await
            .unwrap();
        assert_eq!(decision, RateDecision::Allowed);
    }
}
