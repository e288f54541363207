//! Job types, named queues, and per-queue policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use talenta_models::{JobId, VideoId};

/// Named queues, each with its own worker pool and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    /// Video ingestion (scan, transcode, publish)
    Process,
    /// Delete derived objects for removed videos
    Cleanup,
    /// AI performance scoring of a video
    VideoAnalysis,
    /// AI sentiment/troll scoring of a comment
    CommentAnalysis,
    /// Outbound email notifications
    Send,
    /// Periodic trending-score recompute
    Trending,
}

impl QueueName {
    pub const ALL: [QueueName; 6] = [
        QueueName::Process,
        QueueName::Cleanup,
        QueueName::VideoAnalysis,
        QueueName::CommentAnalysis,
        QueueName::Send,
        QueueName::Trending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Process => "process",
            QueueName::Cleanup => "cleanup",
            QueueName::VideoAnalysis => "video_analysis",
            QueueName::CommentAnalysis => "comment_analysis",
            QueueName::Send => "send",
            QueueName::Trending => "trending",
        }
    }

    /// Operational policy for this queue.
    pub fn policy(&self) -> QueuePolicy {
        match self {
            QueueName::Process => QueuePolicy {
                concurrency: 2,
                max_attempts: 3,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(5),
                },
                keep_completed: 100,
                keep_failed: 50,
            },
            QueueName::Cleanup => QueuePolicy {
                concurrency: 1,
                max_attempts: 3,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(5),
                },
                keep_completed: 100,
                keep_failed: 50,
            },
            QueueName::VideoAnalysis => QueuePolicy {
                concurrency: 1,
                max_attempts: 2,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(10),
                },
                keep_completed: 100,
                keep_failed: 50,
            },
            QueueName::CommentAnalysis => QueuePolicy {
                concurrency: 3,
                max_attempts: 2,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(10),
                },
                keep_completed: 100,
                keep_failed: 50,
            },
            QueueName::Send => QueuePolicy {
                concurrency: 5,
                max_attempts: 3,
                backoff: Backoff::Fixed(Duration::from_secs(5)),
                keep_completed: 100,
                keep_failed: 50,
            },
            QueueName::Trending => QueuePolicy {
                concurrency: 1,
                max_attempts: 1,
                backoff: Backoff::Fixed(Duration::from_secs(0)),
                keep_completed: 10,
                keep_failed: 5,
            },
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-queue operational limits.
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    /// Worker slots processing this queue concurrently
    pub concurrency: usize,
    /// Total delivery attempts before dead-lettering
    pub max_attempts: u32,
    /// Delay policy between attempts
    pub backoff: Backoff,
    /// Completed job records retained for inspection
    pub keep_completed: usize,
    /// Failed job records retained for inspection
    pub keep_failed: usize,
}

impl QueuePolicy {
    /// Whether a failed delivery at this attempt (1-based) has used up its
    /// attempts and must be dead-lettered instead of retried.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Backoff between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt-1)`
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay before the given attempt (1-based: attempt 1 already ran).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
                base.saturating_mul(factor)
            }
        }
    }
}

/// Relative urgency within a queue. Lower-priority jobs are only picked up
/// when no higher-priority entries are waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

/// Job to ingest an uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub user_id: String,
    /// Storage key of the uploaded original
    pub key: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessVideoJob {
    pub fn new(video_id: VideoId, user_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            user_id: user_id.into(),
            key: key.into(),
            created_at: Utc::now(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("process:{}", self.video_id)
    }
}

/// Job to delete a removed video's derived objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupJob {
    pub job_id: JobId,
    pub video_id: VideoId,
    /// Storage keys to delete; failures are logged, never propagated
    pub keys: Vec<String>,
}

impl CleanupJob {
    pub fn new(video_id: VideoId, keys: Vec<String>) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            keys,
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("cleanup:{}", self.video_id)
    }
}

/// Job to score a published video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalysisJob {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub created_at: DateTime<Utc>,
}

impl VideoAnalysisJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            created_at: Utc::now(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("video_analysis:{}", self.video_id)
    }
}

/// Job to score a comment for sentiment and troll likelihood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAnalysisJob {
    pub job_id: JobId,
    pub comment_id: String,
}

impl CommentAnalysisJob {
    pub fn new(comment_id: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            comment_id: comment_id.into(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("comment_analysis:{}", self.comment_id)
    }
}

/// Outbound email notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailJob {
    pub job_id: JobId,
    /// Template name ("video_published", "video_failed", ...)
    pub template: String,
    pub to: String,
    /// Template variables
    pub data: Value,
}

impl SendEmailJob {
    pub fn new(template: impl Into<String>, to: impl Into<String>, data: Value) -> Self {
        Self {
            job_id: JobId::new(),
            template: template.into(),
            to: to.into(),
            data,
        }
    }

    /// Emails are not deduplicated against each other, only against
    /// double-delivery of the same enqueue.
    pub fn idempotency_key(&self) -> String {
        format!("send:{}", self.job_id)
    }
}

/// Recurring trending recompute. One per scheduled occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateTrendingJob {
    pub job_id: JobId,
    /// Occurrence this run covers; also the dedup key across restarts
    pub scheduled_for: DateTime<Utc>,
}

impl CalculateTrendingJob {
    pub fn new(scheduled_for: DateTime<Utc>) -> Self {
        Self {
            job_id: JobId::new(),
            scheduled_for,
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("trending:{}", self.scheduled_for.timestamp())
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    Process(ProcessVideoJob),
    Cleanup(CleanupJob),
    VideoAnalysis(VideoAnalysisJob),
    CommentAnalysis(CommentAnalysisJob),
    Send(SendEmailJob),
    CalculateTrending(CalculateTrendingJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::Process(j) => &j.job_id,
            QueueJob::Cleanup(j) => &j.job_id,
            QueueJob::VideoAnalysis(j) => &j.job_id,
            QueueJob::CommentAnalysis(j) => &j.job_id,
            QueueJob::Send(j) => &j.job_id,
            QueueJob::CalculateTrending(j) => &j.job_id,
        }
    }

    /// Queue this job belongs to.
    pub fn queue(&self) -> QueueName {
        match self {
            QueueJob::Process(_) => QueueName::Process,
            QueueJob::Cleanup(_) => QueueName::Cleanup,
            QueueJob::VideoAnalysis(_) => QueueName::VideoAnalysis,
            QueueJob::CommentAnalysis(_) => QueueName::CommentAnalysis,
            QueueJob::Send(_) => QueueName::Send,
            QueueJob::CalculateTrending(_) => QueueName::Trending,
        }
    }

    /// Video this job concerns, if any.
    pub fn video_id(&self) -> Option<&VideoId> {
        match self {
            QueueJob::Process(j) => Some(&j.video_id),
            QueueJob::Cleanup(j) => Some(&j.video_id),
            QueueJob::VideoAnalysis(j) => Some(&j.video_id),
            _ => None,
        }
    }

    /// Default priority. Analysis runs behind ingestion.
    pub fn default_priority(&self) -> Priority {
        match self {
            QueueJob::VideoAnalysis(_) | QueueJob::CommentAnalysis(_) => Priority::Low,
            _ => Priority::Normal,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::Process(j) => j.idempotency_key(),
            QueueJob::Cleanup(j) => j.idempotency_key(),
            QueueJob::VideoAnalysis(j) => j.idempotency_key(),
            QueueJob::CommentAnalysis(j) => j.idempotency_key(),
            QueueJob::Send(j) => j.idempotency_key(),
            QueueJob::CalculateTrending(j) => j.idempotency_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_job_serde_roundtrip() {
        let job = QueueJob::Process(ProcessVideoJob::new(
            VideoId::from_string("vid_1"),
            "user_1",
            "videos/vid_1/original.mp4",
        ));
        let json = serde_json::to_string(&job).expect("serialize");
        assert!(json.contains("\"type\":\"process\""));
        let decoded: QueueJob = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.queue(), QueueName::Process);
        assert_eq!(decoded.idempotency_key(), "process:vid_1");
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(5),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(5));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(20));
    }

    #[test]
    fn test_queue_policies() {
        assert_eq!(QueueName::Process.policy().concurrency, 2);
        assert_eq!(QueueName::Process.policy().max_attempts, 3);
        assert_eq!(QueueName::CommentAnalysis.policy().concurrency, 3);
        assert_eq!(QueueName::VideoAnalysis.policy().max_attempts, 2);
        assert_eq!(QueueName::Send.policy().concurrency, 5);
        assert_eq!(QueueName::Trending.policy().keep_completed, 10);
    }

    #[test]
    fn test_attempts_exhaust_at_policy_limit() {
        let process = QueueName::Process.policy();
        assert!(!process.exhausted(1));
        assert!(!process.exhausted(2));
        assert!(process.exhausted(3));

        // trending never retries
        assert!(QueueName::Trending.policy().exhausted(1));
    }

    #[test]
    fn test_analysis_priority_below_ingestion() {
        let process = QueueJob::Process(ProcessVideoJob::new(
            VideoId::from_string("v"),
            "u",
            "k",
        ));
        let analysis = QueueJob::VideoAnalysis(VideoAnalysisJob::new(VideoId::from_string("v")));
        assert_eq!(process.default_priority(), Priority::Normal);
        assert_eq!(analysis.default_priority(), Priority::Low);
    }
}
