//! Video encoding configuration and the HLS rendition ladder.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// HLS segment duration in seconds (VOD-style, unbounded playlist)
pub const HLS_SEGMENT_SECONDS: u32 = 10;

/// Fixed thumbnail output size when crop-to-fill is requested
pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

/// One rung of the adaptive bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsRendition {
    /// Vertical resolution in pixels
    pub height: u32,
    /// Target video bitrate in kbit/s
    pub bitrate_kbps: u32,
}

impl HlsRendition {
    /// Rendition name used for directories and playlist files ("720p").
    pub fn name(&self) -> String {
        format!("{}p", self.height)
    }

    /// Declared BANDWIDTH for the master playlist, in bits/sec.
    pub fn bandwidth_bps(&self) -> u64 {
        self.bitrate_kbps as u64 * 1000
    }
}

/// Production adaptive ladder: 480p/1000k, 720p/2500k, 1080p/5000k.
pub const ADAPTIVE_LADDER: [HlsRendition; 3] = [
    HlsRendition { height: 480, bitrate_kbps: 1000 },
    HlsRendition { height: 720, bitrate_kbps: 2500 },
    HlsRendition { height: 1080, bitrate_kbps: 5000 },
];

/// Content type for an output file, keyed by extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if lower.ends_with(".ts") {
        "video/mp2t"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (always re-encoded for playback compatibility)
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl EncodingConfig {
    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}

/// Thumbnail capture timestamp: `max(1, floor(duration * 0.25))` seconds.
pub fn thumbnail_timestamp(duration_secs: f64) -> u32 {
    ((duration_secs * 0.25).floor() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("master.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("seg_000.ts"), "video/mp2t");
        assert_eq!(content_type_for("thumb.jpg"), "image/jpeg");
        assert_eq!(content_type_for("unknown.bin"), "application/octet-stream");
    }

    #[test]
    fn test_ladder() {
        assert_eq!(ADAPTIVE_LADDER.len(), 3);
        assert_eq!(ADAPTIVE_LADDER[1].name(), "720p");
        assert_eq!(ADAPTIVE_LADDER[2].bandwidth_bps(), 5_000_000);
    }

    #[test]
    fn test_thumbnail_timestamp() {
        // floor(duration * 0.25), floored at 1 second
        assert_eq!(thumbnail_timestamp(0.5), 1);
        assert_eq!(thumbnail_timestamp(2.0), 1);
        assert_eq!(thumbnail_timestamp(40.0), 10);
        assert_eq!(thumbnail_timestamp(43.9), 10);
        assert_eq!(thumbnail_timestamp(120.0), 30);
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }
}
