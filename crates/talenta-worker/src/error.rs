//! Worker error types and failure severity.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// How the dispatcher treats a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Never retried: the content itself is the problem
    Fatal,
    /// Retried per the queue's backoff policy, then dead-lettered
    Retryable,
    /// Logged and acknowledged; must not block the primary flow
    BestEffort,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Virus detected: {0}")]
    VirusDetected(String),

    #[error("Video {0} is already being processed")]
    AlreadyProcessing(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] talenta_storage::StorageError),

    #[error("Scan error: {0}")]
    Scan(#[from] talenta_scan::ScanError),

    #[error("Media error: {0}")]
    Media(#[from] talenta_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] talenta_queue::QueueError),

    #[error("AI service error: {0}")]
    Ai(#[from] talenta_ai_client::AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Failure severity, applied uniformly by the dispatcher.
    pub fn severity(&self) -> Severity {
        match self {
            // Retrying cannot change what the file contains
            WorkerError::VirusDetected(_) | WorkerError::InvalidTransition(_) => Severity::Fatal,

            // Another worker holds the video; this delivery is redundant
            WorkerError::AlreadyProcessing(_)
            | WorkerError::VideoNotFound(_)
            | WorkerError::CommentNotFound(_) => Severity::BestEffort,

            WorkerError::ConfigError(_) => Severity::Fatal,

            // Infrastructure blips are the queue's problem
            WorkerError::Storage(_)
            | WorkerError::Scan(_)
            | WorkerError::Media(_)
            | WorkerError::Queue(_)
            | WorkerError::Ai(_)
            | WorkerError::Io(_)
            | WorkerError::JobFailed(_) => Severity::Retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            WorkerError::VirusDetected("Eicar".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            WorkerError::AlreadyProcessing("v1".into()).severity(),
            Severity::BestEffort
        );
        assert_eq!(
            WorkerError::JobFailed("flake".into()).severity(),
            Severity::Retryable
        );
        assert_eq!(
            WorkerError::Io(std::io::Error::other("net")).severity(),
            Severity::Retryable
        );
    }
}
