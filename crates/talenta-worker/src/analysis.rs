//! AI analysis handlers.
//!
//! Video scoring is retryable: a failed service call propagates so the
//! queue applies backoff (the development profile swaps in a fallback
//! scorer instead, selected at startup). Comment scoring is best-effort
//! end to end: comment moderation must never block the comment pipeline.

use tracing::{info, warn};

use talenta_ai_client::VideoScoreRequest;
use talenta_models::{AiAnalysisStatus, VideoId};
use talenta_queue::{CommentAnalysisJob, VideoAnalysisJob};

use crate::error::WorkerResult;
use crate::pipeline::ProcessingContext;
use crate::store::VideoUpdate;

/// Comments above this troll confidence are auto-flagged.
pub const TROLL_FLAG_THRESHOLD: f64 = 0.8;

/// Handle a `video_analysis` job.
pub async fn analyze_video(ctx: &ProcessingContext, job: &VideoAnalysisJob) -> WorkerResult<()> {
    let video_id = &job.video_id;
    let record = ctx.videos.get(video_id).await?;

    ctx.videos
        .update(
            video_id,
            VideoUpdate::default().ai_status(AiAnalysisStatus::Processing),
        )
        .await?;

    let request = VideoScoreRequest {
        video_id: video_id.to_string(),
        video_url: record.original_key.clone(),
        duration: record.duration.map(|d| d as u32),
        category_id: record.category_id.clone(),
    };

    // Leave the status at Processing on failure: retries may still succeed,
    // and the dead-letter hook records the terminal outcome
    let scores = ctx.scorer.score_video(request).await?;

    info!(
        "Video {} scored: performance {}",
        video_id, scores.performance
    );
    ctx.videos
        .update(
            video_id,
            VideoUpdate {
                ai_analysis_status: Some(AiAnalysisStatus::Completed),
                ai_scores: Some(scores),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

/// Bookkeeping for a `video_analysis` job that exhausted its attempts: only
/// now is the analysis marked failed.
pub async fn record_analysis_failure(
    ctx: &ProcessingContext,
    video_id: &VideoId,
    error: &str,
) -> WorkerResult<()> {
    ctx.videos
        .update(
            video_id,
            VideoUpdate {
                ai_analysis_status: Some(AiAnalysisStatus::Failed),
                moderation_notes: Some(format!("AI analysis failed: {}", error)),
                ..Default::default()
            },
        )
        .await
}

/// Handle a `comment_analysis` job. Never propagates a failure.
pub async fn analyze_comment(ctx: &ProcessingContext, job: &CommentAnalysisJob) -> WorkerResult<()> {
    let comment = match ctx.comments.get(&job.comment_id).await {
        Ok(comment) => comment,
        Err(e) => {
            warn!("Skipping comment analysis for {}: {}", job.comment_id, e);
            return Ok(());
        }
    };

    let scores = match ctx
        .scorer
        .score_comment(&comment.id, &comment.content)
        .await
    {
        Ok(scores) => scores,
        Err(e) => {
            warn!("Comment scoring failed for {}, skipping: {}", comment.id, e);
            return Ok(());
        }
    };

    let flagged = scores.troll_confidence > TROLL_FLAG_THRESHOLD;
    if flagged {
        info!(
            "Comment {} auto-flagged (troll confidence {})",
            comment.id, scores.troll_confidence
        );
    }

    if let Err(e) = ctx.comments.set_scores(&comment.id, scores, flagged).await {
        warn!("Failed to persist comment scores for {}: {}", comment.id, e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use talenta_ai_client::{AiError, AiResult, CommentScores, Scorer};
    use talenta_models::{AiScores, VideoRecord};

    use crate::store::{CommentRecord, CommentStore, VideoStore};
    use crate::testutil::{test_context, test_context_with};

    /// Always fails, as an unreachable scoring service would.
    struct FailingScorer;

    #[async_trait]
    impl Scorer for FailingScorer {
        async fn score_video(&self, _request: VideoScoreRequest) -> AiResult<AiScores> {
            Err(AiError::Timeout(300))
        }

        async fn score_comment(&self, _comment_id: &str, _content: &str) -> AiResult<CommentScores> {
            Err(AiError::Timeout(30))
        }
    }

    /// Captures the video request it was called with.
    #[derive(Default)]
    struct RecordingScorer {
        last: Mutex<Option<VideoScoreRequest>>,
    }

    #[async_trait]
    impl Scorer for RecordingScorer {
        async fn score_video(&self, request: VideoScoreRequest) -> AiResult<AiScores> {
            *self.last.lock().unwrap() = Some(request);
            Ok(AiScores::default())
        }

        async fn score_comment(&self, _comment_id: &str, _content: &str) -> AiResult<CommentScores> {
            Ok(CommentScores {
                sentiment_score: 0.0,
                is_troll: false,
                troll_confidence: 0.0,
            })
        }
    }

    #[tokio::test]
    async fn test_analyze_video_completes_with_scores() {
        let (ctx, videos, _) = test_context().await;
        let id = VideoId::from_string("v1");
        videos
            .insert(VideoRecord::new(id.clone(), "u1", "videos/v1/original"))
            .await;

        analyze_video(&ctx, &VideoAnalysisJob::new(id.clone()))
            .await
            .unwrap();

        let record = videos.get(&id).await.unwrap();
        assert_eq!(record.ai_analysis_status, AiAnalysisStatus::Completed);
        let scores = record.ai_scores.expect("scores persisted");
        assert!((70.0..=100.0).contains(&scores.performance));
        assert!(!scores.category_tags.is_empty());
    }

    #[tokio::test]
    async fn test_troll_comment_auto_flagged() {
        let (ctx, _, comments) = test_context().await;
        comments
            .insert(CommentRecord {
                id: "c1".to_string(),
                author_id: "u2".to_string(),
                content: "you are TRASH garbage loser WORST!!!".to_string(),
                scores: None,
                flagged: false,
            })
            .await;

        analyze_comment(&ctx, &CommentAnalysisJob::new("c1"))
            .await
            .unwrap();

        let comment = comments.get("c1").await.unwrap();
        assert!(comment.flagged);
        let scores = comment.scores.expect("scores persisted");
        assert_eq!(scores.troll_confidence, 0.9);
        assert!(scores.troll_confidence > TROLL_FLAG_THRESHOLD);
    }

    #[tokio::test]
    async fn test_threshold_confidence_not_flagged() {
        let (ctx, _, comments) = test_context().await;
        // word-list hit (0.3) + punctuation (0.3) + short-aggressive (0.2)
        // lands exactly on the threshold, which must not flag
        comments
            .insert(CommentRecord {
                id: "c2".to_string(),
                author_id: "u2".to_string(),
                content: "hate this!!!".to_string(),
                scores: None,
                flagged: false,
            })
            .await;

        analyze_comment(&ctx, &CommentAnalysisJob::new("c2"))
            .await
            .unwrap();

        let comment = comments.get("c2").await.unwrap();
        let scores = comment.scores.expect("scores persisted");
        assert_eq!(scores.troll_confidence, TROLL_FLAG_THRESHOLD);
        assert!(!comment.flagged);
    }

    #[tokio::test]
    async fn test_missing_comment_is_swallowed() {
        let (ctx, _, _) = test_context().await;
        // best-effort: never an error, even when the comment is gone
        analyze_comment(&ctx, &CommentAnalysisJob::new("nope"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_attempt_leaves_status_processing() {
        let (ctx, videos, _) = test_context_with(Arc::new(FailingScorer)).await;
        let id = VideoId::from_string("v-retry");
        videos
            .insert(VideoRecord::new(id.clone(), "u1", "videos/v-retry/original"))
            .await;

        let result = analyze_video(&ctx, &VideoAnalysisJob::new(id.clone())).await;
        assert!(result.is_err());

        // still awaiting a retry, not failed
        let record = videos.get(&id).await.unwrap();
        assert_eq!(record.ai_analysis_status, AiAnalysisStatus::Processing);
        assert!(record.ai_scores.is_none());
    }

    #[tokio::test]
    async fn test_terminal_analysis_failure_marked() {
        let (ctx, videos, _) = test_context().await;
        let id = VideoId::from_string("v-dead");
        videos
            .insert(VideoRecord::new(id.clone(), "u1", "videos/v-dead/original"))
            .await;

        record_analysis_failure(&ctx, &id, "scoring call timed out")
            .await
            .unwrap();

        let record = videos.get(&id).await.unwrap();
        assert_eq!(record.ai_analysis_status, AiAnalysisStatus::Failed);
        assert!(record
            .moderation_notes
            .unwrap()
            .contains("scoring call timed out"));
    }

    #[tokio::test]
    async fn test_scoring_request_carries_category() {
        let scorer = Arc::new(RecordingScorer::default());
        let (ctx, videos, _) = test_context_with(scorer.clone()).await;

        let id = VideoId::from_string("v-cat");
        let mut record = VideoRecord::new(id.clone(), "u1", "videos/v-cat/original");
        record.category_id = Some("dance".to_string());
        videos.insert(record).await;

        analyze_video(&ctx, &VideoAnalysisJob::new(id)).await.unwrap();

        let request = scorer.last.lock().unwrap().take().expect("request captured");
        assert_eq!(request.category_id.as_deref(), Some("dance"));
    }
}
