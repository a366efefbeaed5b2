//! Pipeline scanning and content generation dispatch
//!
//! The cron-facing scanner walks all active pipelines, processes the due
//! ones sequentially, and reports a per-pipeline outcome. One pipeline's
//! failure never aborts the rest of the scan. Re-running inside the same due
//! window is safe: a topic leaves `pending` before its content is generated,
//! so a second scan has nothing left to pick up.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::{ContentGenerator, GenerationRequest};
use crate::db::Database;
use crate::error::{CadenceError, Result};
use crate::schedule::{next_run_at, seconds_until_due};
use crate::types::{Pipeline, Platform, Post, PostStatus, Topic, TopicStatus};

/// Result of scanning all active pipelines once.
#[derive(Debug, Serialize)]
pub struct PipelineScanReport {
    pub total_active: usize,
    pub processed: usize,
    pub results: Vec<PipelineRunResult>,
}

#[derive(Debug, Serialize)]
pub struct PipelineRunResult {
    pub pipeline_id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: PipelineOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Not due yet; `due_in_secs` says how long until it is.
    Skipped { due_in_secs: i64 },
    Processed(PipelineReport),
    Failed { error: String },
}

/// What processing one due pipeline produced.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub topics_processed: usize,
    pub platforms_used: Vec<Platform>,
    pub platforms_skipped: Vec<Platform>,
    pub outcomes: Vec<GenerationOutcome>,
}

/// Per topic-platform generation attempt. Failures sit alongside successes
/// in the report instead of aborting the pass.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub topic_id: String,
    pub platform: Platform,
    #[serde(flatten)]
    pub result: GenerationResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationResult {
    Created { post_id: String },
    Failed { error: String },
}

pub struct PipelineRunner {
    db: Database,
    generator: Box<dyn ContentGenerator>,
}

impl PipelineRunner {
    pub fn new(db: Database, generator: Box<dyn ContentGenerator>) -> Self {
        Self { db, generator }
    }

    /// Cron entry point: process every active pipeline that is due at `now`.
    pub async fn run_due_pipelines(&self, now: i64) -> Result<PipelineScanReport> {
        let pipelines = self.db.get_active_pipelines().await?;
        info!(total = pipelines.len(), "checking active pipelines");

        let mut results = Vec::with_capacity(pipelines.len());
        let mut processed = 0;

        for pipeline in &pipelines {
            // A pipeline that has never been seeded counts as due.
            let due_at = pipeline.next_run_at.unwrap_or(0);
            if due_at > now {
                results.push(PipelineRunResult {
                    pipeline_id: pipeline.id.clone(),
                    name: pipeline.name.clone(),
                    outcome: PipelineOutcome::Skipped {
                        due_in_secs: seconds_until_due(due_at, now),
                    },
                });
                continue;
            }

            match self.process_pipeline(pipeline, now).await {
                Ok(report) => {
                    processed += 1;
                    results.push(PipelineRunResult {
                        pipeline_id: pipeline.id.clone(),
                        name: pipeline.name.clone(),
                        outcome: PipelineOutcome::Processed(report),
                    });
                }
                Err(e) => {
                    warn!(pipeline_id = %pipeline.id, error = %e, "pipeline processing failed");
                    results.push(PipelineRunResult {
                        pipeline_id: pipeline.id.clone(),
                        name: pipeline.name.clone(),
                        outcome: PipelineOutcome::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(PipelineScanReport {
            total_active: pipelines.len(),
            processed,
            results,
        })
    }

    /// Process one due pipeline: generate content for its pending topics on
    /// every connected platform, then advance the schedule exactly once.
    pub async fn process_pipeline(&self, pipeline: &Pipeline, now: i64) -> Result<PipelineReport> {
        let (valid_platforms, skipped_platforms) = self.resolve_platforms(pipeline).await?;

        for platform in &skipped_platforms {
            warn!(pipeline_id = %pipeline.id, %platform, "no active connection, skipping platform");
        }

        // A pipeline with nothing connected must still advance, or it would
        // stay due and be re-scanned every tick.
        if valid_platforms.is_empty() {
            self.advance_pipeline(pipeline, now).await?;
            return Ok(PipelineReport {
                topics_processed: 0,
                platforms_used: valid_platforms,
                platforms_skipped: skipped_platforms,
                outcomes: Vec::new(),
            });
        }

        let brand_voice = self.db.get_brand_voice(&pipeline.user_id).await?;
        let topics = self.db.get_pending_topics(&pipeline.id).await?;

        let mut outcomes = Vec::new();
        for topic in &topics {
            info!(pipeline_id = %pipeline.id, topic = %topic.title, "generating content for topic");
            let topic_outcomes = self
                .generate_for_platforms(
                    pipeline,
                    topic,
                    &valid_platforms,
                    brand_voice.as_deref(),
                    now,
                )
                .await?;
            outcomes.extend(topic_outcomes);
        }

        self.advance_pipeline(pipeline, now).await?;

        Ok(PipelineReport {
            topics_processed: topics.len(),
            platforms_used: valid_platforms,
            platforms_skipped: skipped_platforms,
            outcomes,
        })
    }

    /// Instant-generation path: generate for one specific topic right away,
    /// outside the due-time check. Completes (or fails) before returning.
    /// Does not advance the pipeline schedule.
    pub async fn generate_for_topic(&self, topic_id: &str, now: i64) -> Result<PipelineReport> {
        let topic = self
            .db
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| CadenceError::InvalidInput(format!("topic not found: {}", topic_id)))?;

        if topic.status != TopicStatus::Pending {
            return Err(CadenceError::InvalidInput(format!(
                "topic {} is not pending (status: {})",
                topic_id,
                topic.status.as_str()
            )));
        }

        let pipeline = self.db.get_pipeline(&topic.pipeline_id).await?.ok_or_else(|| {
            CadenceError::InvalidInput(format!("pipeline not found: {}", topic.pipeline_id))
        })?;

        let (valid_platforms, skipped_platforms) = self.resolve_platforms(&pipeline).await?;
        if valid_platforms.is_empty() {
            return Err(CadenceError::InvalidInput(format!(
                "pipeline {} has no connected platforms",
                pipeline.id
            )));
        }

        let brand_voice = self.db.get_brand_voice(&pipeline.user_id).await?;
        let outcomes = self
            .generate_for_platforms(&pipeline, &topic, &valid_platforms, brand_voice.as_deref(), now)
            .await?;

        Ok(PipelineReport {
            topics_processed: 1,
            platforms_used: valid_platforms,
            platforms_skipped: skipped_platforms,
            outcomes,
        })
    }

    /// Split the pipeline's target platforms into those with an active
    /// connection and those without.
    async fn resolve_platforms(
        &self,
        pipeline: &Pipeline,
    ) -> Result<(Vec<Platform>, Vec<Platform>)> {
        let mut valid = Vec::new();
        let mut skipped = Vec::new();

        for &platform in &pipeline.platforms {
            match self.db.get_connection(&pipeline.user_id, platform).await? {
                Some(connection) if connection.is_active => valid.push(platform),
                _ => skipped.push(platform),
            }
        }

        Ok((valid, skipped))
    }

    /// Generate and store posts for one topic across the given platforms,
    /// then mark the topic generated. The topic leaves `pending` first, so a
    /// concurrent or repeated scan cannot pick it up again; it ends
    /// `generated` even when every platform failed; the created (or absent)
    /// posts carry the failure visibility.
    async fn generate_for_platforms(
        &self,
        pipeline: &Pipeline,
        topic: &Topic,
        platforms: &[Platform],
        brand_voice: Option<&str>,
        now: i64,
    ) -> Result<Vec<GenerationOutcome>> {
        self.db
            .update_topic_status(&topic.id, TopicStatus::Generating)
            .await?;

        // The due instant in the cron path; the upcoming instant when a
        // topic is generated ahead of schedule.
        let scheduled_for = pipeline.next_run_at.unwrap_or(now);

        let mut outcomes = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            let request = GenerationRequest {
                topic: topic.title.clone(),
                notes: topic.notes.clone(),
                platform,
                brand_voice: brand_voice.map(str::to_string),
            };

            match self.generator.generate(&request).await {
                Ok(generated) => {
                    let (status, scheduled_for) = if pipeline.review_required {
                        (PostStatus::Generated, None)
                    } else {
                        (PostStatus::Scheduled, Some(scheduled_for))
                    };

                    let post = Post {
                        id: Uuid::new_v4().to_string(),
                        topic_id: topic.id.clone(),
                        pipeline_id: pipeline.id.clone(),
                        user_id: pipeline.user_id.clone(),
                        platform,
                        content: generated.content,
                        hashtags: generated.hashtags,
                        image_url: None,
                        image_prompt: generated.image_prompt,
                        status,
                        scheduled_for,
                        published_at: None,
                        platform_post_id: None,
                        error_message: None,
                        retry_count: 0,
                        created_at: now,
                    };
                    self.db.create_post(&post).await?;

                    outcomes.push(GenerationOutcome {
                        topic_id: topic.id.clone(),
                        platform,
                        result: GenerationResult::Created { post_id: post.id },
                    });
                }
                Err(e) => {
                    warn!(topic_id = %topic.id, %platform, error = %e, "content generation failed");
                    outcomes.push(GenerationOutcome {
                        topic_id: topic.id.clone(),
                        platform,
                        result: GenerationResult::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        self.db.mark_topic_generated(&topic.id, now).await?;

        Ok(outcomes)
    }

    async fn advance_pipeline(&self, pipeline: &Pipeline, now: i64) -> Result<()> {
        // Advance from the pipeline's own schedule, not from now, so the
        // cadence doesn't drift with cron jitter.
        let next = next_run_at(pipeline.frequency, pipeline.next_run_at.unwrap_or(now), now);
        self.db.advance_pipeline(&pipeline.id, now, next).await
    }
}
