//! FFmpeg CLI wrapper for the ingestion pipeline.
//!
//! Wraps `ffmpeg`/`ffprobe` as child processes: probing, thumbnail
//! extraction, and HLS transcoding (single rendition or adaptive ladder),
//! with per-invocation deadlines and cooperative cancellation.

pub mod command;
pub mod error;
pub mod hls;
pub mod probe;
pub mod thumbnail;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use hls::{HlsOutput, LadderPolicy, Transcoder};
pub use probe::{probe_video, VideoInfo};
pub use thumbnail::{crop_to_fill, extract_frame_at, extract_thumbnail};
