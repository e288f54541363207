//! Video ingestion pipeline: scan, transcode, publish.
//!
//! One `process` job drives the whole state machine for a video. Stage
//! ordering is the sequential control flow of the handler itself; the
//! scratch directory and the per-video claim are released on every exit
//! path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info, warn};

use talenta_ai_client::Scorer;
use talenta_media::{crop_to_fill, extract_frame_at, probe_video, Transcoder, VideoInfo};
use talenta_models::encoding::thumbnail_timestamp;
use talenta_models::{ModerationStatus, VideoId, VideoStatus};
use talenta_queue::{
    CleanupJob, JobQueue, ProcessVideoJob, QueueError, QueueJob, SendEmailJob, VideoAnalysisJob,
    VideoClaims,
};
use talenta_scan::{ScanClient, ScanVerdict};
use talenta_storage::ObjectStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::store::{CommentStore, Notifier, VideoStore, VideoUpdate, ViewStore};

/// Everything a job handler needs.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub storage: ObjectStore,
    pub scanner: ScanClient,
    pub queue: Arc<JobQueue>,
    pub claims: VideoClaims,
    pub scorer: Arc<dyn Scorer>,
    pub videos: Arc<dyn VideoStore>,
    pub views: Arc<dyn ViewStore>,
    pub comments: Arc<dyn CommentStore>,
    pub notifier: Arc<dyn Notifier>,
    /// Cancellation signal for in-flight transcodes
    pub cancel_rx: watch::Receiver<bool>,
}

/// Job-scoped scratch directory. Removed when dropped, so every exit path
/// of the handler, including propagated errors, releases the disk.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub async fn create(root: &str, video_id: &VideoId) -> WorkerResult<Self> {
        let path = Path::new(root).join(video_id.as_str());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to remove scratch dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Handle a `process` job end to end.
pub async fn process_video(ctx: &ProcessingContext, job: &ProcessVideoJob) -> WorkerResult<()> {
    info!("Processing video {} (job {})", job.video_id, job.job_id);

    // At most one in-flight process job per video
    let claim = match ctx.claims.acquire(&job.video_id).await {
        Ok(claim) => claim,
        Err(QueueError::ClaimHeld(id)) => return Err(WorkerError::AlreadyProcessing(id)),
        Err(e) => return Err(e.into()),
    };

    let result = run_stages(ctx, job).await;

    if let Err(e) = ctx.claims.release(claim).await {
        warn!("Failed to release claim for {}: {}", job.video_id, e);
    }

    result
}

/// Move the record to `target` when that is a legal step forward. Retried
/// attempts re-enter earlier stages without rewinding the row, so a stage
/// the previous attempt already reached is left as-is.
async fn advance_status(
    ctx: &ProcessingContext,
    video_id: &VideoId,
    target: VideoStatus,
) -> WorkerResult<()> {
    let current = ctx.videos.get(video_id).await?.status;
    if current.can_transition_to(target) {
        ctx.videos
            .update(video_id, VideoUpdate::default().status(target))
            .await?;
    }
    Ok(())
}

async fn run_stages(ctx: &ProcessingContext, job: &ProcessVideoJob) -> WorkerResult<()> {
    let video_id = &job.video_id;
    let record = ctx.videos.get(video_id).await?;

    // The enqueuer normally leaves the record in Processing; tolerate a
    // direct handoff from Pending.
    advance_status(ctx, video_id, VideoStatus::Processing).await?;
    advance_status(ctx, video_id, VideoStatus::Scanning).await?;

    let scratch = ScratchDir::create(&ctx.config.work_dir, video_id).await?;
    let original = scratch.path().join("original");

    ctx.storage
        .download_file(&ctx.storage.buckets().videos, &job.key, &original)
        .await?;

    // Virus-positive is terminal and never retried
    let verdict = ctx.scanner.scan(&original.to_string_lossy()).await?;
    if let ScanVerdict::Infected { signature } = verdict {
        return fail_for_virus(ctx, job, &record.owner_id, &signature).await;
    }

    let info = probe_video(&original).await?;

    let thumbnail_url = publish_thumbnail(ctx, video_id, &original, &scratch, &info).await?;

    advance_status(ctx, video_id, VideoStatus::Transcoding).await?;

    let hls_dir = scratch.path().join("hls");
    let transcoder = Transcoder::new()
        .with_timeout(ctx.config.transcode_timeout.as_secs())
        .with_cancel(ctx.cancel_rx.clone());
    let output = transcoder
        .transcode(&original, &hls_dir, ctx.config.ladder_policy())
        .await?;

    let key_prefix = format!("videos/{}/hls", video_id);
    ctx.storage
        .upload_dir(&ctx.storage.buckets().videos, &hls_dir, &key_prefix)
        .await?;
    let hls_key = format!("{}/{}", key_prefix, output.entry_playlist);

    ctx.videos
        .update(
            video_id,
            VideoUpdate {
                status: Some(VideoStatus::Ready),
                hls_key: Some(hls_key),
                thumbnail_url: Some(thumbnail_url),
                duration: Some(info.duration),
                width: Some(info.width),
                height: Some(info.height),
                moderation_status: Some(ModerationStatus::Pending),
                published_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

    // Fan-out: analysis behind ingestion, plus the publish notification
    ctx.queue
        .enqueue(QueueJob::VideoAnalysis(VideoAnalysisJob::new(
            video_id.clone(),
        )))
        .await?;
    ctx.queue
        .enqueue(QueueJob::Send(SendEmailJob::new(
            "video_published",
            &record.owner_id,
            json!({ "videoId": video_id.as_str() }),
        )))
        .await?;

    info!("Video {} published", video_id);
    Ok(())
}

async fn fail_for_virus(
    ctx: &ProcessingContext,
    job: &ProcessVideoJob,
    owner_id: &str,
    signature: &str,
) -> WorkerResult<()> {
    warn!("Virus detected in video {}: {}", job.video_id, signature);

    ctx.videos
        .update(
            &job.video_id,
            VideoUpdate::default()
                .status(VideoStatus::Failed)
                .moderation(ModerationStatus::VirusDetected, signature),
        )
        .await?;

    // Terminal by design: returning Ok keeps the attempt count at 1, so the
    // notification must not turn the verdict into a retryable failure
    if let Err(e) = ctx
        .queue
        .enqueue(QueueJob::Send(SendEmailJob::new(
            "video_failed",
            owner_id,
            json!({
                "videoId": job.video_id.as_str(),
                "reason": "A virus was detected in the uploaded file",
            }),
        )))
        .await
    {
        warn!(
            "Failed to enqueue failure notification for {}: {}",
            job.video_id, e
        );
    }

    Ok(())
}

async fn publish_thumbnail(
    ctx: &ProcessingContext,
    video_id: &VideoId,
    original: &Path,
    scratch: &ScratchDir,
    info: &VideoInfo,
) -> WorkerResult<String> {
    let capture = scratch.path().join("capture.jpg");
    let thumb = scratch.path().join("thumb.jpg");

    extract_frame_at(original, &capture, thumbnail_timestamp(info.duration)).await?;
    crop_to_fill(&capture, &thumb).await?;

    let key = format!("{}.jpg", video_id);
    let bucket = ctx.storage.buckets().thumbnails.clone();
    ctx.storage.upload_file(&bucket, &thumb, &key).await?;

    Ok(ctx.storage.public_url(&bucket, &key))
}

/// Record the aftermath of a dead-lettered `process` job: the status stays
/// where the last attempt left it, moderation carries the reason, and the
/// owner is told.
pub async fn record_terminal_failure(
    ctx: &ProcessingContext,
    video_id: &VideoId,
    error: &str,
) -> WorkerResult<()> {
    let record = ctx.videos.get(video_id).await?;

    ctx.videos
        .update(
            video_id,
            VideoUpdate::default().moderation(ModerationStatus::ProcessingError, error),
        )
        .await?;

    // The job is already dead-lettered; the notification is best-effort
    if let Err(e) = ctx
        .queue
        .enqueue(QueueJob::Send(SendEmailJob::new(
            "video_failed",
            &record.owner_id,
            json!({
                "videoId": video_id.as_str(),
                "reason": "Processing failed repeatedly; our team has been notified",
            }),
        )))
        .await
    {
        warn!(
            "Failed to enqueue failure notification for {}: {}",
            video_id, e
        );
    }

    Ok(())
}

/// Handle a `cleanup` job. Best-effort: per-object failures are logged and
/// swallowed so deletion never blocks on a missing object.
pub async fn run_cleanup(ctx: &ProcessingContext, job: &CleanupJob) -> WorkerResult<()> {
    info!(
        "Cleaning up {} objects for video {}",
        job.keys.len(),
        job.video_id
    );

    let videos_bucket = ctx.storage.buckets().videos.clone();
    for key in &job.keys {
        if let Err(e) = ctx.storage.delete_object(&videos_bucket, key).await {
            warn!("Failed to delete {}/{}: {}", videos_bucket, key, e);
        }
    }

    let thumb_bucket = ctx.storage.buckets().thumbnails.clone();
    let thumb_key = format!("{}.jpg", job.video_id);
    if let Err(e) = ctx.storage.delete_object(&thumb_bucket, &thumb_key).await {
        warn!("Failed to delete {}/{}: {}", thumb_bucket, thumb_key, e);
    }

    Ok(())
}

/// Handle a `send` job: deliver a notification through the notifier seam.
pub async fn send_email(ctx: &ProcessingContext, job: &SendEmailJob) -> WorkerResult<()> {
    ctx.notifier.send(&job.template, &job.to, &job.data).await?;
    Ok(())
}

/// Log a dispatch-level failure; used by the executor for best-effort jobs.
pub fn log_swallowed(job: &QueueJob, error: &WorkerError) {
    error!(
        "Job {} failed (best-effort, swallowed): {}",
        job.job_id(),
        error
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use talenta_models::VideoRecord;

    use crate::testutil::test_context;

    #[tokio::test]
    async fn test_virus_verdict_is_terminal() {
        let (ctx, videos, _) = test_context().await;
        let id = VideoId::from_string("v-virus");
        let mut record = VideoRecord::new(id.clone(), "u1", "videos/v-virus/original");
        record.status = VideoStatus::Scanning;
        videos.insert(record).await;

        let job = ProcessVideoJob::new(id.clone(), "u1", "videos/v-virus/original");
        // Ok, not Err: the delivery is acked on attempt 1 and never retried
        fail_for_virus(&ctx, &job, "u1", "Eicar-Test-Signature")
            .await
            .unwrap();

        let record = videos.get(&id).await.unwrap();
        assert_eq!(record.status, VideoStatus::Failed);
        assert_eq!(record.moderation_status, ModerationStatus::VirusDetected);
        assert_eq!(
            record.moderation_notes.as_deref(),
            Some("Eicar-Test-Signature")
        );
    }

    #[tokio::test]
    async fn test_dead_letter_keeps_last_status() {
        let (ctx, videos, _) = test_context().await;
        let id = VideoId::from_string("v-dead");
        let mut record = VideoRecord::new(id.clone(), "u1", "videos/v-dead/original");
        record.status = VideoStatus::Transcoding;
        videos.insert(record).await;

        record_terminal_failure(&ctx, &id, "FFmpeg exited with non-zero status")
            .await
            .unwrap();

        // the status stays where the last attempt left it
        let record = videos.get(&id).await.unwrap();
        assert_eq!(record.status, VideoStatus::Transcoding);
        assert_eq!(record.moderation_status, ModerationStatus::ProcessingError);
        assert!(record.moderation_notes.unwrap().contains("FFmpeg"));
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_string_lossy().to_string();
        let id = VideoId::from_string("scratch-test");

        let path = {
            let scratch = ScratchDir::create(&root_str, &id).await.unwrap();
            tokio::fs::write(scratch.path().join("original"), b"data")
                .await
                .unwrap();
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_scratch_dir_path_is_per_video() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_string_lossy().to_string();

        let a = ScratchDir::create(&root_str, &VideoId::from_string("a"))
            .await
            .unwrap();
        let b = ScratchDir::create(&root_str, &VideoId::from_string("b"))
            .await
            .unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().ends_with("a"));
    }
}
