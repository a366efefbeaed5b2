//! Publishing dispatch and scanning
//!
//! The dispatcher moves one post through `scheduled → published` or
//! `scheduled → failed`. A rate-limit refusal is neither: the post stays
//! scheduled and untouched for a later scan; the `Deferred` variant keeps
//! that distinction explicit. The scanners walk due, failed, and
//! image-less posts sequentially, one at a time.

use serde::Serialize;
use tracing::{info, warn};

use crate::ai::ImageGenerator;
use crate::config::PublishingConfig;
use crate::db::Database;
use crate::error::Result;
use crate::platforms::AdapterRegistry;
use crate::rate_limiter::{RateDecision, RateLimiter};
use crate::storage::ImageStore;
use crate::types::Platform;

/// Outcome of one publish attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Terminal success; publish fields stamped on the post.
    Published { platform_post_id: String },
    /// Rate-limit refusal. The post was not mutated and no retry was
    /// consumed; a later scan reattempts it.
    Deferred { reason: String },
    /// Terminal failure for this attempt, recorded on the post.
    Failed { error: String },
}

#[derive(Debug, Serialize)]
pub struct PostPublishResult {
    pub post_id: String,
    pub platform: Platform,
    #[serde(flatten)]
    pub outcome: PublishOutcome,
}

/// Operator diagnostics returned when a scan finds nothing due.
#[derive(Debug, Serialize)]
pub struct QueueDiagnostics {
    pub server_time: i64,
    pub queue_depth: usize,
    pub next_scheduled_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PublishScanReport {
    pub processed: usize,
    pub results: Vec<PostPublishResult>,
    pub backfilled_images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<QueueDiagnostics>,
}

#[derive(Debug, Serialize)]
pub struct RetryScanReport {
    pub processed: usize,
    pub results: Vec<PostPublishResult>,
}

/// Bounds for publishing, retry, and backfill scans.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub max_posts_per_hour: u32,
    pub max_retries: u32,
    pub retry_window_secs: i64,
    pub retry_batch: u32,
    pub image_backfill_batch: u32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::from(&PublishingConfig::default())
    }
}

impl From<&PublishingConfig> for PublishOptions {
    fn from(config: &PublishingConfig) -> Self {
        Self {
            max_posts_per_hour: config.max_posts_per_hour,
            max_retries: config.max_retries,
            retry_window_secs: config.retry_window_hours as i64 * 3_600,
            retry_batch: config.retry_batch,
            image_backfill_batch: config.image_backfill_batch,
        }
    }
}

pub struct Publisher {
    db: Database,
    adapters: AdapterRegistry,
    rate_limiter: RateLimiter,
    image_generator: Box<dyn ImageGenerator>,
    image_store: Box<dyn ImageStore>,
    options: PublishOptions,
}

impl Publisher {
    pub fn new(
        db: Database,
        adapters: AdapterRegistry,
        image_generator: Box<dyn ImageGenerator>,
        image_store: Box<dyn ImageStore>,
        options: PublishOptions,
    ) -> Self {
        let rate_limiter = RateLimiter::new(options.max_posts_per_hour);
        Self {
            db,
            adapters,
            rate_limiter,
            image_generator,
            image_store,
            options,
        }
    }

    /// Publish one post by id.
    ///
    /// Returns `Err` only for storage failures. Everything per-post
    /// (missing row, missing connection, adapter rejection, rate refusal)
    /// comes back as a `PublishOutcome`.
    pub async fn publish_post(&self, post_id: &str, now: i64) -> Result<PublishOutcome> {
        let Some(post) = self.db.get_post(post_id).await? else {
            return Ok(PublishOutcome::Failed {
                error: format!("post not found: {}", post_id),
            });
        };

        // Credentials before anything else; no network call without them.
        let connection = match self.db.get_connection(&post.user_id, post.platform).await? {
            Some(connection) if connection.is_active => connection,
            Some(_) => {
                let error = "platform connection is paused".to_string();
                self.db.mark_post_failed(&post.id, &error).await?;
                return Ok(PublishOutcome::Failed { error });
            }
            None => {
                let error = "no platform connection found".to_string();
                self.db.mark_post_failed(&post.id, &error).await?;
                return Ok(PublishOutcome::Failed { error });
            }
        };

        if let RateDecision::Limited { published_in_window } = self
            .rate_limiter
            .check(&self.db, &post.user_id, post.platform, now)
            .await?
        {
            info!(post_id = %post.id, platform = %post.platform, "rate limit reached, deferring");
            return Ok(PublishOutcome::Deferred {
                reason: format!(
                    "rate limit reached: {} posts published to {} in the last hour",
                    published_in_window, post.platform
                ),
            });
        }

        let Some(adapter) = self.adapters.get(post.platform) else {
            // Fails without consuming a retry; there is nothing transient
            // about an unsupported platform.
            let error = match post.platform {
                Platform::Instagram => {
                    "instagram publishing is disabled pending platform approval".to_string()
                }
                other => format!("unsupported platform: {}", other),
            };
            self.db.mark_post_failed(&post.id, &error).await?;
            return Ok(PublishOutcome::Failed { error });
        };

        let message = compose_message(&post.content, &post.hashtags);

        match adapter.publish(&post, &message, &connection).await {
            Ok(platform_post_id) => {
                self.db
                    .mark_post_published(&post.id, &platform_post_id, now)
                    .await?;
                info!(post_id = %post.id, platform = %post.platform, %platform_post_id, "published");
                Ok(PublishOutcome::Published { platform_post_id })
            }
            Err(e) => {
                let error = e.to_string();
                warn!(post_id = %post.id, platform = %post.platform, %error, "publish failed");
                self.db.record_publish_failure(&post.id, &error).await?;
                Ok(PublishOutcome::Failed { error })
            }
        }
    }

    /// Cron entry point: backfill missing images, then publish every post
    /// whose scheduled instant has passed.
    pub async fn run_due_publishing(&self, now: i64) -> Result<PublishScanReport> {
        let due = self.db.get_due_posts(now).await?;
        let backfilled_images = self.backfill_images().await;

        if due.is_empty() {
            let (queue_depth, next_scheduled_at) = self.db.scheduled_queue_info().await?;
            return Ok(PublishScanReport {
                processed: 0,
                results: Vec::new(),
                backfilled_images,
                diagnostics: Some(QueueDiagnostics {
                    server_time: now,
                    queue_depth,
                    next_scheduled_at,
                }),
            });
        }

        info!(count = due.len(), "publishing due posts");

        let mut results = Vec::with_capacity(due.len());
        for post in &due {
            let outcome = self.publish_post(&post.id, now).await?;
            results.push(PostPublishResult {
                post_id: post.id.clone(),
                platform: post.platform,
                outcome,
            });
        }

        Ok(PublishScanReport {
            processed: due.len(),
            results,
            backfilled_images,
            diagnostics: None,
        })
    }

    /// Cron entry point: reattempt failed posts still inside the retry
    /// bounds.
    pub async fn run_retries(&self, now: i64) -> Result<RetryScanReport> {
        let min_created_at = now - self.options.retry_window_secs;
        let posts = self
            .db
            .get_failed_posts_for_retry(self.options.max_retries, min_created_at, self.options.retry_batch)
            .await?;

        if posts.is_empty() {
            return Ok(RetryScanReport {
                processed: 0,
                results: Vec::new(),
            });
        }

        info!(count = posts.len(), "retrying failed posts");

        let mut results = Vec::with_capacity(posts.len());
        for post in &posts {
            info!(post_id = %post.id, platform = %post.platform, retry = post.retry_count, "retrying");
            let outcome = self.publish_post(&post.id, now).await?;
            results.push(PostPublishResult {
                post_id: post.id.clone(),
                platform: post.platform,
                outcome,
            });
        }

        Ok(RetryScanReport {
            processed: posts.len(),
            results,
        })
    }

    /// Opportunistic, bounded image generation for posts that asked for one.
    /// Strictly best-effort: every failure is logged and isolated, and a
    /// broken image path never blocks publishing.
    async fn backfill_images(&self) -> usize {
        let posts = match self
            .db
            .get_posts_missing_images(self.options.image_backfill_batch)
            .await
        {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, "image backfill query failed");
                return 0;
            }
        };

        let mut backfilled = 0;
        for post in posts {
            let Some(prompt) = post.image_prompt.as_deref() else {
                continue;
            };

            let bytes = match self.image_generator.generate(prompt).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "image generation failed");
                    continue;
                }
            };

            let url = match self.image_store.store(&post.id, &bytes).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "image store failed");
                    continue;
                }
            };

            match self.db.set_post_image(&post.id, &url).await {
                Ok(()) => {
                    info!(post_id = %post.id, %url, "backfilled image");
                    backfilled += 1;
                }
                Err(e) => warn!(post_id = %post.id, error = %e, "image url update failed"),
            }
        }

        backfilled
    }
}

/// Compose the outbound message: post content, then the hashtags (each
/// normalized to a single leading `#`) on their own paragraph.
pub fn compose_message(content: &str, hashtags: &[String]) -> String {
    let tags: Vec<String> = hashtags
        .iter()
        .filter_map(|tag| normalize_hashtag(tag))
        .collect();

    if tags.is_empty() {
        content.to_string()
    } else {
        format!("{}\n\n{}", content, tags.join(" "))
    }
}

fn normalize_hashtag(tag: &str) -> Option<String> {
    let bare = tag.trim().trim_start_matches('#');
    if bare.is_empty() {
        None
    } else {
        Some(format!("#{}", bare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_message_appends_hashtags() {
        let message = compose_message(
            "Big news today!",
            &["launch".to_string(), "#startup".to_string()],
        );
        assert_eq!(message, "Big news today!\n\n#launch #startup");
    }

    #[test]
    fn test_compose_message_without_hashtags() {
        assert_eq!(compose_message("Just text", &[]), "Just text");
    }

    #[test]
    fn test_compose_message_drops_empty_tags() {
        let message = compose_message(
            "Text",
            &["".to_string(), "  ".to_string(), "##double".to_string()],
        );
        assert_eq!(message, "Text\n\n#double");
    }

    #[test]
    fn test_publish_options_from_config() {
        let options = PublishOptions::from(&PublishingConfig::default());
        assert_eq!(options.max_posts_per_hour, 5);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_window_secs, 24 * 3_600);
        assert_eq!(options.retry_batch, 10);
        assert_eq!(options.image_backfill_batch, 5);
    }
}
