//! Cadence - automated social media content pipelines
//!
//! This library provides the scheduling and publishing engine: recurring
//! pipelines turn queued topics into platform-tailored posts via an AI
//! provider, and a publish dispatcher delivers due posts to the connected
//! platforms with rate limiting, token refresh, and bounded retries.

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod publisher;
pub mod rate_limiter;
pub mod runner;
pub mod schedule;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CadenceError, Result};
pub use publisher::{PublishOutcome, Publisher};
pub use runner::PipelineRunner;
pub use types::{Frequency, Pipeline, Platform, PlatformConnection, Post, PostStatus, Topic, TopicStatus};
