//! Thumbnail extraction.
//!
//! Frames are captured at native resolution first; when a fixed output size
//! is requested the capture is cropped to fill in a separate pass, so a crop
//! failure degrades to the uncropped capture instead of losing the thumbnail.

use std::path::Path;

use tracing::warn;

use talenta_models::encoding::{thumbnail_timestamp, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Extract a single frame at the standard capture point for `duration_secs`.
pub async fn extract_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    duration_secs: f64,
) -> MediaResult<()> {
    extract_frame_at(video_path, output_path, thumbnail_timestamp(duration_secs)).await
}

/// Extract a single frame at `timestamp_secs`, native resolution.
pub async fn extract_frame_at(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timestamp_secs: u32,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path.as_ref(), output_path.as_ref())
        .seek(timestamp_secs as f64)
        .single_frame();

    FfmpegRunner::new().run(&cmd).await
}

/// Crop-to-fill an existing capture to the fixed 1280x720 output size.
///
/// Scales up just enough to cover the target box, then center-crops, so
/// the aspect ratio is never distorted. Failure falls back to the
/// uncropped capture.
pub async fn crop_to_fill(
    capture_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let capture_path = capture_path.as_ref();
    let output_path = output_path.as_ref();

    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = THUMBNAIL_WIDTH,
        h = THUMBNAIL_HEIGHT,
    );

    let cmd = FfmpegCommand::new(capture_path, output_path)
        .video_filter(filter)
        .single_frame();

    match FfmpegRunner::new().run(&cmd).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Thumbnail crop failed, keeping uncropped capture: {}", e);
            tokio::fs::copy(capture_path, output_path).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_filter_shape() {
        let filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
            w = THUMBNAIL_WIDTH,
            h = THUMBNAIL_HEIGHT,
        );
        assert!(filter.contains("1280:720"));
        assert!(filter.contains("force_original_aspect_ratio=increase"));
    }
}
