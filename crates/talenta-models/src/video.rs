//! Video metadata models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video lifecycle status.
///
/// Transitions are monotonic along
/// `Pending -> Processing -> Scanning -> Transcoding -> Ready`, except the
/// terminal branches `Failed` and `Removed`. A video never re-enters
/// `Pending` after leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Uploaded, waiting for the pipeline
    #[default]
    Pending,
    /// Claimed by the enqueuer, handed to the worker
    Processing,
    /// Virus scan in progress
    Scanning,
    /// Transcode in progress
    Transcoding,
    /// Published and playable
    Ready,
    /// Terminal failure (scan positive or processing error)
    Failed,
    /// Explicitly deleted, never set by the pipeline
    Removed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Scanning => "scanning",
            VideoStatus::Transcoding => "transcoding",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
            VideoStatus::Removed => "removed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Failed | VideoStatus::Removed)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        match (self, next) {
            (_, Removed) => !self.is_terminal(),
            (Pending, Processing) => true,
            (Processing, Scanning) => true,
            (Scanning, Transcoding) => true,
            (Transcoding, Ready) => true,
            (Processing | Scanning | Transcoding, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moderation status set by the pipeline or moderators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    /// Not yet reviewed
    #[default]
    None,
    /// Published, awaiting moderation review
    Pending,
    /// Approved by a moderator
    Approved,
    /// Virus scan reported an infection
    VirusDetected,
    /// Processing failed before publish
    ProcessingError,
    /// Auto-flagged for review (e.g. troll comment threshold)
    Flagged,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::None => "none",
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::VirusDetected => "virus_detected",
            ModerationStatus::ProcessingError => "processing_error",
            ModerationStatus::Flagged => "flagged",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// AI analysis lifecycle for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiAnalysisStatus {
    #[default]
    None,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AiAnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiAnalysisStatus::None => "none",
            AiAnalysisStatus::Pending => "pending",
            AiAnalysisStatus::Processing => "processing",
            AiAnalysisStatus::Completed => "completed",
            AiAnalysisStatus::Failed => "failed",
        }
    }
}

/// Per-dimension AI performance scores, each in [0,100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AiScores {
    /// Composite performance score
    pub performance: f64,
    /// Vocal quality (absent for non-vocal content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal: Option<f64>,
    /// Facial expression / camera presence
    pub expression: f64,
    /// Body movement (absent for static content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<f64>,
    /// Timing / rhythm
    pub timing: f64,
    /// Production quality
    pub quality: f64,
    /// Detected category tags (e.g. "singer", "dancer")
    #[serde(default)]
    pub category_tags: Vec<String>,
}

impl AiScores {
    /// Clamp every dimension into [0,100] and round to one decimal place.
    pub fn normalized(mut self) -> Self {
        fn norm(v: f64) -> f64 {
            (v.clamp(0.0, 100.0) * 10.0).round() / 10.0
        }
        self.performance = norm(self.performance);
        self.vocal = self.vocal.map(norm);
        self.expression = norm(self.expression);
        self.movement = self.movement.map(norm);
        self.timing = norm(self.timing);
        self.quality = norm(self.quality);
        self
    }
}

/// Video record as seen by the pipeline.
///
/// The REST layer owns the durable row; the pipeline reads identity and
/// file key, and writes status, storage keys, probe metadata, moderation,
/// AI scores, and trending scores through the `VideoStore` seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Unique video ID
    pub id: VideoId,

    /// Owner user ID
    pub owner_id: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: VideoStatus,

    /// Object key of the uploaded original
    pub original_key: String,

    /// Category chosen at upload; carried to the scoring service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    /// Object key of the published HLS master/playlist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_key: Option<String>,

    /// Public thumbnail URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Duration in seconds (after probe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Width in pixels (after probe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Height in pixels (after probe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Moderation status
    #[serde(default)]
    pub moderation_status: ModerationStatus,

    /// Moderation notes (virus signature, error message)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_notes: Option<String>,

    /// AI analysis lifecycle
    #[serde(default)]
    pub ai_analysis_status: AiAnalysisStatus,

    /// AI performance scores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_scores: Option<AiScores>,

    /// Trending score, recomputed hourly
    #[serde(default)]
    pub trending_score: f64,

    /// Engagement score, recomputed hourly
    #[serde(default)]
    pub engagement_score: f64,

    /// Whether the video is publicly discoverable
    #[serde(default)]
    pub is_public: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Publish timestamp (set when status becomes Ready)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Create a new pending record for an uploaded file.
    pub fn new(id: VideoId, owner_id: impl Into<String>, original_key: impl Into<String>) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            status: VideoStatus::Pending,
            original_key: original_key.into(),
            category_id: None,
            hls_key: None,
            thumbnail_url: None,
            duration: None,
            width: None,
            height: None,
            moderation_status: ModerationStatus::None,
            moderation_notes: None,
            ai_analysis_status: AiAnalysisStatus::None,
            ai_scores: None,
            trending_score: 0.0,
            engagement_score: 0.0,
            is_public: true,
            created_at: Utc::now(),
            published_at: None,
        }
    }
}

/// Aggregated view/engagement statistics for one video.
///
/// Read-only analytics input to the trending calculator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VideoViewStats {
    /// Total recorded views
    pub views: u64,
    /// Views within the last 24 hours
    pub views_24h: u64,
    /// Views within the last 7 days
    pub views_7d: u64,
    /// Total likes
    pub likes: u64,
    /// Total comments
    pub comments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::new();
        let id2 = VideoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_status_edges() {
        use VideoStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Scanning));
        assert!(Scanning.can_transition_to(Transcoding));
        assert!(Transcoding.can_transition_to(Ready));
        assert!(Scanning.can_transition_to(Failed));

        // Pending is never re-entered and terminal states stay terminal
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Ready.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Removed.can_transition_to(Removed));
        // Removed is reachable from any live state via explicit deletion
        assert!(Ready.can_transition_to(Removed));
        assert!(Pending.can_transition_to(Removed));
    }

    #[test]
    fn test_scores_normalized() {
        let scores = AiScores {
            performance: 87.6543,
            vocal: Some(120.0),
            expression: -3.0,
            movement: None,
            timing: 70.05,
            quality: 99.99,
            category_tags: vec!["singer".to_string()],
        }
        .normalized();

        assert_eq!(scores.performance, 87.7);
        assert_eq!(scores.vocal, Some(100.0));
        assert_eq!(scores.expression, 0.0);
        assert_eq!(scores.movement, None);
        assert_eq!(scores.timing, 70.1);
        assert_eq!(scores.quality, 100.0);
    }

    #[test]
    fn test_record_defaults() {
        let rec = VideoRecord::new(VideoId::new(), "user123", "uploads/abc.mp4");
        assert_eq!(rec.status, VideoStatus::Pending);
        assert_eq!(rec.moderation_status, ModerationStatus::None);
        assert!(rec.hls_key.is_none());
        assert!(rec.published_at.is_none());
    }
}
