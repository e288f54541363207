//! Seams to the record layer.
//!
//! The REST layer owns the durable rows; the pipeline only needs a handful
//! of field-scoped partial updates keyed by id. These traits are that
//! surface. The in-memory implementations back tests and the development
//! profile; last-write-wins, like the real row store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use talenta_ai_client::CommentScores;
use talenta_models::{
    AiAnalysisStatus, AiScores, ModerationStatus, VideoId, VideoRecord, VideoStatus,
    VideoViewStats,
};

use crate::error::{WorkerError, WorkerResult};

/// Field-scoped partial update for a video row. Unset fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct VideoUpdate {
    pub status: Option<VideoStatus>,
    pub hls_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub moderation_status: Option<ModerationStatus>,
    pub moderation_notes: Option<String>,
    pub ai_analysis_status: Option<AiAnalysisStatus>,
    pub ai_scores: Option<AiScores>,
    pub trending_score: Option<f64>,
    pub engagement_score: Option<f64>,
    pub published_at: Option<DateTime<Utc>>,
}

impl VideoUpdate {
    pub fn status(mut self, status: VideoStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn moderation(mut self, status: ModerationStatus, notes: impl Into<String>) -> Self {
        self.moderation_status = Some(status);
        self.moderation_notes = Some(notes.into());
        self
    }

    pub fn ai_status(mut self, status: AiAnalysisStatus) -> Self {
        self.ai_analysis_status = Some(status);
        self
    }
}

/// Video rows as seen by the pipeline.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get(&self, id: &VideoId) -> WorkerResult<VideoRecord>;

    /// Apply a partial update. A `status` change must follow the lifecycle
    /// edges or the update is rejected whole.
    async fn update(&self, id: &VideoId, update: VideoUpdate) -> WorkerResult<()>;

    /// All ready, public videos (the trending calculator's input set).
    async fn list_live(&self) -> WorkerResult<Vec<VideoRecord>>;
}

/// View/engagement counters, read-only.
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn stats(&self, id: &VideoId) -> WorkerResult<VideoViewStats>;
}

/// Comment row as seen by the analysis worker.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub scores: Option<CommentScores>,
    pub flagged: bool,
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get(&self, id: &str) -> WorkerResult<CommentRecord>;

    /// Persist scores; `flagged` transitions the comment into moderation.
    async fn set_scores(&self, id: &str, scores: CommentScores, flagged: bool)
        -> WorkerResult<()>;
}

/// Outbound user notifications. The email queue handler delivers through
/// this seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, template: &str, to: &str, data: &Value) -> WorkerResult<()>;
}

/// In-memory video store.
#[derive(Default)]
pub struct InMemoryVideoStore {
    videos: Arc<RwLock<HashMap<VideoId, VideoRecord>>>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: VideoRecord) {
        self.videos.write().await.insert(record.id.clone(), record);
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn get(&self, id: &VideoId) -> WorkerResult<VideoRecord> {
        self.videos
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::VideoNotFound(id.to_string()))
    }

    async fn update(&self, id: &VideoId, update: VideoUpdate) -> WorkerResult<()> {
        let mut videos = self.videos.write().await;
        let record = videos
            .get_mut(id)
            .ok_or_else(|| WorkerError::VideoNotFound(id.to_string()))?;

        if let Some(status) = update.status {
            if !record.status.can_transition_to(status) {
                return Err(WorkerError::InvalidTransition(format!(
                    "{}: {} -> {}",
                    id, record.status, status
                )));
            }
            record.status = status;
        }
        if let Some(v) = update.hls_key {
            record.hls_key = Some(v);
        }
        if let Some(v) = update.thumbnail_url {
            record.thumbnail_url = Some(v);
        }
        if let Some(v) = update.duration {
            record.duration = Some(v);
        }
        if let Some(v) = update.width {
            record.width = Some(v);
        }
        if let Some(v) = update.height {
            record.height = Some(v);
        }
        if let Some(v) = update.moderation_status {
            record.moderation_status = v;
        }
        if let Some(v) = update.moderation_notes {
            record.moderation_notes = Some(v);
        }
        if let Some(v) = update.ai_analysis_status {
            record.ai_analysis_status = v;
        }
        if let Some(v) = update.ai_scores {
            record.ai_scores = Some(v);
        }
        if let Some(v) = update.trending_score {
            record.trending_score = v;
        }
        if let Some(v) = update.engagement_score {
            record.engagement_score = v;
        }
        if let Some(v) = update.published_at {
            record.published_at = Some(v);
        }

        Ok(())
    }

    async fn list_live(&self) -> WorkerResult<Vec<VideoRecord>> {
        Ok(self
            .videos
            .read()
            .await
            .values()
            .filter(|v| v.status == VideoStatus::Ready && v.is_public)
            .cloned()
            .collect())
    }
}

/// In-memory view counters.
#[derive(Default)]
pub struct InMemoryViewStore {
    stats: Arc<RwLock<HashMap<VideoId, VideoViewStats>>>,
}

impl InMemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, id: VideoId, stats: VideoViewStats) {
        self.stats.write().await.insert(id, stats);
    }
}

#[async_trait]
impl ViewStore for InMemoryViewStore {
    async fn stats(&self, id: &VideoId) -> WorkerResult<VideoViewStats> {
        Ok(self
            .stats
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory comment store.
#[derive(Default)]
pub struct InMemoryCommentStore {
    comments: Arc<RwLock<HashMap<String, CommentRecord>>>,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: CommentRecord) {
        self.comments.write().await.insert(record.id.clone(), record);
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn get(&self, id: &str) -> WorkerResult<CommentRecord> {
        self.comments
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::CommentNotFound(id.to_string()))
    }

    async fn set_scores(
        &self,
        id: &str,
        scores: CommentScores,
        flagged: bool,
    ) -> WorkerResult<()> {
        let mut comments = self.comments.write().await;
        let record = comments
            .get_mut(id)
            .ok_or_else(|| WorkerError::CommentNotFound(id.to_string()))?;
        record.scores = Some(scores);
        record.flagged = flagged;
        Ok(())
    }
}

/// Notifier that only logs. Development stand-in for the mail service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, template: &str, to: &str, data: &Value) -> WorkerResult<()> {
        info!("Notification [{}] to {}: {}", template, to, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_rejects_bad_transition() {
        let store = InMemoryVideoStore::new();
        let id = VideoId::from_string("v1");
        store
            .insert(VideoRecord::new(id.clone(), "u1", "videos/v1/original.mp4"))
            .await;

        // Pending -> Transcoding skips Processing/Scanning
        let err = store
            .update(&id, VideoUpdate::default().status(VideoStatus::Transcoding))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidTransition(_)));

        // the record is untouched
        assert_eq!(store.get(&id).await.unwrap().status, VideoStatus::Pending);
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let store = InMemoryVideoStore::new();
        let id = VideoId::from_string("v2");
        store
            .insert(VideoRecord::new(id.clone(), "u1", "videos/v2/original.mp4"))
            .await;

        store
            .update(
                &id,
                VideoUpdate {
                    duration: Some(40.0),
                    width: Some(1920),
                    height: Some(1080),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.duration, Some(40.0));
        assert_eq!(record.status, VideoStatus::Pending);
        assert!(record.hls_key.is_none());
    }

    #[tokio::test]
    async fn test_list_live_filters() {
        let store = InMemoryVideoStore::new();
        let ready = VideoId::from_string("ready");
        let pending = VideoId::from_string("pending");

        let mut record = VideoRecord::new(ready.clone(), "u1", "k1");
        record.status = VideoStatus::Ready;
        store.insert(record).await;
        store
            .insert(VideoRecord::new(pending.clone(), "u1", "k2"))
            .await;

        let live = store.list_live().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, ready);
    }
}
