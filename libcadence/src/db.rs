//! Database operations for Cadence
//!
//! Every lookup returns `Result<Option<T>>`; "not found" is a value, never an
//! error code to sniff. Each scheduling/publishing lifecycle phase owns its
//! own mutation methods (the runner advances pipelines, the dispatcher writes
//! post publish fields) so rows have one logical writer per phase.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{
    Pipeline, Platform, PlatformConnection, Post, PostStatus, Topic, TopicStatus,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes work for SQLite URLs on both Windows and Unix;
        // mode=rwc creates the database file if it doesn't exist.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub async fn upsert_profile(&self, user_id: &str, brand_voice: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, brand_voice, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET brand_voice = excluded.brand_voice
            "#,
        )
        .bind(user_id)
        .bind(brand_voice)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Brand-voice preference for a user, if a profile exists.
    pub async fn get_brand_voice(&self, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT brand_voice FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.and_then(|r| r.get("brand_voice")))
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    pub async fn create_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        let platforms = serde_json::to_string(
            &pipeline
                .platforms
                .iter()
                .map(Platform::as_str)
                .collect::<Vec<_>>(),
        )
        .map_err(|e| DbError::Decode(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO pipelines
                (id, user_id, name, platforms, frequency, post_time, timezone,
                 review_required, is_active, last_run_at, next_run_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pipeline.id)
        .bind(&pipeline.user_id)
        .bind(&pipeline.name)
        .bind(platforms)
        .bind(pipeline.frequency.as_str())
        .bind(&pipeline.post_time)
        .bind(&pipeline.timezone)
        .bind(pipeline.review_required as i32)
        .bind(pipeline.is_active as i32)
        .bind(pipeline.last_run_at)
        .bind(pipeline.next_run_at)
        .bind(pipeline.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>> {
        let row = sqlx::query("SELECT * FROM pipelines WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| pipeline_from_row(&r)).transpose()
    }

    pub async fn get_active_pipelines(&self) -> Result<Vec<Pipeline>> {
        let rows = sqlx::query("SELECT * FROM pipelines WHERE is_active = 1 ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(pipeline_from_row).collect()
    }

    /// Persist an advanced schedule. Owned by the pipeline runner.
    pub async fn advance_pipeline(&self, id: &str, last_run_at: i64, next_run_at: i64) -> Result<()> {
        sqlx::query("UPDATE pipelines SET last_run_at = ?, next_run_at = ? WHERE id = ?")
            .bind(last_run_at)
            .bind(next_run_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Topics
    // ========================================================================

    pub async fn create_topic(&self, topic: &Topic) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topics
                (id, pipeline_id, title, notes, is_evergreen, recycle_interval_days,
                 last_used_at, sort_order, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&topic.id)
        .bind(&topic.pipeline_id)
        .bind(&topic.title)
        .bind(&topic.notes)
        .bind(topic.is_evergreen as i32)
        .bind(topic.recycle_interval_days)
        .bind(topic.last_used_at)
        .bind(topic.sort_order)
        .bind(topic.status.as_str())
        .bind(topic.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        let row = sqlx::query("SELECT * FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| topic_from_row(&r)).transpose()
    }

    /// Pending topics for a pipeline, in processing order.
    pub async fn get_pending_topics(&self, pipeline_id: &str) -> Result<Vec<Topic>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM topics
            WHERE pipeline_id = ? AND status = 'pending'
            ORDER BY sort_order ASC, created_at ASC
            "#,
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(topic_from_row).collect()
    }

    pub async fn update_topic_status(&self, id: &str, status: TopicStatus) -> Result<()> {
        sqlx::query("UPDATE topics SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Flip a topic to generated and stamp its last use.
    pub async fn mark_topic_generated(&self, id: &str, used_at: i64) -> Result<()> {
        sqlx::query("UPDATE topics SET status = 'generated', last_used_at = ? WHERE id = ?")
            .bind(used_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let hashtags =
            serde_json::to_string(&post.hashtags).map_err(|e| DbError::Decode(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO posts
                (id, topic_id, pipeline_id, user_id, platform, content, hashtags,
                 image_url, image_prompt, status, scheduled_for, published_at,
                 platform_post_id, error_message, retry_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.topic_id)
        .bind(&post.pipeline_id)
        .bind(&post.user_id)
        .bind(post.platform.as_str())
        .bind(&post.content)
        .bind(hashtags)
        .bind(&post.image_url)
        .bind(&post.image_prompt)
        .bind(post.status.as_str())
        .bind(post.scheduled_for)
        .bind(post.published_at)
        .bind(&post.platform_post_id)
        .bind(&post.error_message)
        .bind(post.retry_count)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }

    /// Posts scheduled at or before `now`, oldest first.
    pub async fn get_due_posts(&self, now: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE status = 'scheduled' AND scheduled_for IS NOT NULL AND scheduled_for <= ?
            ORDER BY scheduled_for ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Depth of the scheduled queue and the next instant anything is due,
    /// for operator diagnostics when a scan finds nothing to publish.
    pub async fn scheduled_queue_info(&self) -> Result<(usize, Option<i64>)> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS depth, MIN(scheduled_for) AS next_at FROM posts WHERE status = 'scheduled'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let depth: i64 = row.get("depth");
        let next_at: Option<i64> = row.get("next_at");
        Ok((depth as usize, next_at))
    }

    /// Failed posts still inside the retry bounds, oldest first.
    pub async fn get_failed_posts_for_retry(
        &self,
        max_retries: u32,
        min_created_at: i64,
        limit: u32,
    ) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE status = 'failed' AND retry_count < ? AND created_at >= ?
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(max_retries as i64)
        .bind(min_created_at)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Posts holding an image prompt but no image yet, bounded for one
    /// backfill pass.
    pub async fn get_posts_missing_images(&self, limit: u32) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE status IN ('scheduled', 'generated', 'published')
              AND image_prompt IS NOT NULL AND image_prompt != ''
              AND (image_url IS NULL OR image_url = '')
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    pub async fn set_post_image(&self, id: &str, image_url: &str) -> Result<()> {
        sqlx::query("UPDATE posts SET image_url = ? WHERE id = ?")
            .bind(image_url)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Terminal publish success: stamps publish fields and clears any stale
    /// error message.
    pub async fn mark_post_published(
        &self,
        id: &str,
        platform_post_id: &str,
        published_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET status = 'published', published_at = ?, platform_post_id = ?, error_message = NULL
            WHERE id = ?
            "#,
        )
        .bind(published_at)
        .bind(platform_post_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Failure that does not consume a retry (missing connection,
    /// unsupported platform).
    pub async fn mark_post_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE posts SET status = 'failed', error_message = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Adapter failure: records the error and consumes one retry.
    pub async fn record_publish_failure(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET status = 'failed', error_message = ?, retry_count = retry_count + 1
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Posts published for (owner, platform) since `since`, i.e. inside the
    /// trailing rate-limit window.
    pub async fn count_published_since(
        &self,
        user_id: &str,
        platform: Platform,
        since: i64,
    ) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM posts
            WHERE user_id = ? AND platform = ? AND status = 'published' AND published_at >= ?
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let n: i64 = row.get("n");
        Ok(n as u32)
    }

    // ========================================================================
    // Platform connections
    // ========================================================================

    pub async fn create_connection(&self, connection: &PlatformConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_connections
                (id, user_id, platform, access_token, refresh_token, token_expires_at,
                 account_id, account_name, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&connection.id)
        .bind(&connection.user_id)
        .bind(connection.platform.as_str())
        .bind(&connection.access_token)
        .bind(&connection.refresh_token)
        .bind(connection.token_expires_at)
        .bind(&connection.account_id)
        .bind(&connection.account_name)
        .bind(connection.is_active as i32)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_connection(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<PlatformConnection>> {
        let row = sqlx::query(
            "SELECT * FROM platform_connections WHERE user_id = ? AND platform = ?",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| connection_from_row(&r)).transpose()
    }

    /// Persist refreshed OAuth tokens. Owned by the Twitter adapter.
    pub async fn update_connection_tokens(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expires_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE platform_connections
            SET access_token = ?, refresh_token = ?, token_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn decode<T: std::str::FromStr<Err = String>>(value: String, column: &str) -> Result<T> {
    value
        .parse()
        .map_err(|e: String| DbError::Decode(format!("{}: {}", column, e)).into())
}

fn pipeline_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Pipeline> {
    let platform_names: Vec<String> = serde_json::from_str(&row.get::<String, _>("platforms"))
        .map_err(|e| DbError::Decode(format!("platforms: {}", e)))?;
    let platforms = platform_names
        .into_iter()
        .map(|name| decode(name, "platforms"))
        .collect::<Result<Vec<Platform>>>()?;

    Ok(Pipeline {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        platforms,
        frequency: decode(row.get("frequency"), "frequency")?,
        post_time: row.get("post_time"),
        timezone: row.get("timezone"),
        review_required: row.get::<i32, _>("review_required") != 0,
        is_active: row.get::<i32, _>("is_active") != 0,
        last_run_at: row.get("last_run_at"),
        next_run_at: row.get("next_run_at"),
        created_at: row.get("created_at"),
    })
}

fn topic_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Topic> {
    Ok(Topic {
        id: row.get("id"),
        pipeline_id: row.get("pipeline_id"),
        title: row.get("title"),
        notes: row.get("notes"),
        is_evergreen: row.get::<i32, _>("is_evergreen") != 0,
        recycle_interval_days: row.get("recycle_interval_days"),
        last_used_at: row.get("last_used_at"),
        sort_order: row.get("sort_order"),
        status: decode(row.get("status"), "status")?,
        created_at: row.get("created_at"),
    })
}

fn post_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let hashtags: Vec<String> = serde_json::from_str(&row.get::<String, _>("hashtags"))
        .map_err(|e| DbError::Decode(format!("hashtags: {}", e)))?;

    Ok(Post {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        pipeline_id: row.get("pipeline_id"),
        user_id: row.get("user_id"),
        platform: decode(row.get("platform"), "platform")?,
        content: row.get("content"),
        hashtags,
        image_url: row.get("image_url"),
        image_prompt: row.get("image_prompt"),
        status: decode::<PostStatus>(row.get("status"), "status")?,
        scheduled_for: row.get("scheduled_for"),
        published_at: row.get("published_at"),
        platform_post_id: row.get("platform_post_id"),
        error_message: row.get("error_message"),
        retry_count: row.get("retry_count"),
        created_at: row.get("created_at"),
    })
}

fn connection_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PlatformConnection> {
    Ok(PlatformConnection {
        id: row.get("id"),
        user_id: row.get("user_id"),
        platform: decode(row.get("platform"), "platform")?,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        token_expires_at: row.get("token_expires_at"),
        account_id: row.get("account_id"),
        account_name: row.get("account_name"),
        is_active: row.get::<i32, _>("is_active") != 0,
    })
}
