//! Durable job queue for the ingestion pipeline, backed by Redis Streams.
//!
//! Named queues with priority bands, per-queue retry policies with delayed
//! backoff, dead-letter streams, per-video mutual-exclusion claims, and a
//! cron scheduler for recurring jobs.

pub mod claim;
pub mod error;
pub mod job;
pub mod queue;
pub mod scheduler;

pub use claim::{ClaimConfig, VideoClaim, VideoClaims};
pub use error::{QueueError, QueueResult};
pub use job::{
    Backoff, CalculateTrendingJob, CleanupJob, CommentAnalysisJob, Priority, ProcessVideoJob,
    QueueJob, QueueName, QueuePolicy, SendEmailJob, VideoAnalysisJob,
};
pub use queue::{Delivered, JobQueue, QueueConfig, RetryDecision};
pub use scheduler::{RecurringScheduler, TRENDING_SCHEDULE};
