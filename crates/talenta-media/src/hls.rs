//! HLS transcoding: single rendition and the adaptive bitrate ladder.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, info};

use talenta_models::encoding::{EncodingConfig, HlsRendition, ADAPTIVE_LADDER, HLS_SEGMENT_SECONDS};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Which renditions a transcode produces. Selected once at startup from
/// the execution profile, never re-decided per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderPolicy {
    /// One HLS rendition at source resolution.
    Single,
    /// Full adaptive ladder plus a master playlist.
    Adaptive,
}

impl LadderPolicy {
    /// Map an execution profile name to a policy.
    pub fn for_profile(profile: &str) -> Self {
        if profile.eq_ignore_ascii_case("production") {
            Self::Adaptive
        } else {
            Self::Single
        }
    }
}

/// Result of an HLS transcode.
#[derive(Debug, Clone)]
pub struct HlsOutput {
    /// Playlist the player starts from, relative to the output directory.
    /// `playlist.m3u8` for a single rendition, `master.m3u8` for adaptive.
    pub entry_playlist: String,
    /// Rendition names produced ("source" or "480p"/"720p"/"1080p").
    pub renditions: Vec<String>,
}

/// HLS transcoder over a local input file.
pub struct Transcoder {
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder {
    pub fn new() -> Self {
        Self {
            encoding: EncodingConfig::default(),
            timeout_secs: None,
            cancel_rx: None,
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Deadline applied to each FFmpeg invocation.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(ref rx) = self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }

    /// Transcode per `policy`, returning the entry playlist.
    pub async fn transcode(
        &self,
        input: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
        policy: LadderPolicy,
    ) -> MediaResult<HlsOutput> {
        match policy {
            LadderPolicy::Single => self.transcode_single(input, out_dir).await,
            LadderPolicy::Adaptive => self.transcode_adaptive(input, out_dir).await,
        }
    }

    /// Produce one HLS rendition at source resolution.
    ///
    /// 10s segments, VOD-style unbounded playlist, faststart so players can
    /// begin before the whole file is indexed.
    pub async fn transcode_single(
        &self,
        input: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
    ) -> MediaResult<HlsOutput> {
        let input = input.as_ref();
        let out_dir = out_dir.as_ref();
        tokio::fs::create_dir_all(out_dir).await?;

        let playlist = out_dir.join("playlist.m3u8");
        let segments = out_dir.join("segment_%03d.ts");

        info!("Transcoding single HLS rendition: {}", input.display());

        let cmd = FfmpegCommand::new(input, &playlist)
            .output_args(self.encoding.to_ffmpeg_args())
            .output_args(hls_args(&segments));

        self.runner().run(&cmd).await?;

        Ok(HlsOutput {
            entry_playlist: "playlist.m3u8".to_string(),
            renditions: vec!["source".to_string()],
        })
    }

    /// Produce the full adaptive ladder and a hand-assembled master playlist.
    ///
    /// Each rung is scaled to its target height with the width auto-computed
    /// to preserve aspect ratio (even dimensions enforced) and re-encoded at
    /// its target bitrate under its own subdirectory.
    pub async fn transcode_adaptive(
        &self,
        input: impl AsRef<Path>,
        out_dir: impl AsRef<Path>,
    ) -> MediaResult<HlsOutput> {
        let input = input.as_ref();
        let out_dir = out_dir.as_ref();
        tokio::fs::create_dir_all(out_dir).await?;

        let info = probe_video(input).await?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::InvalidVideo(
                "Source has no usable video dimensions".to_string(),
            ));
        }

        let mut renditions = Vec::with_capacity(ADAPTIVE_LADDER.len());
        for rendition in ADAPTIVE_LADDER {
            self.transcode_rendition(input, out_dir, &rendition).await?;
            renditions.push(rendition.name());
        }

        let master = build_master_playlist(&ADAPTIVE_LADDER, info.width, info.height);
        tokio::fs::write(out_dir.join("master.m3u8"), master).await?;

        Ok(HlsOutput {
            entry_playlist: "master.m3u8".to_string(),
            renditions,
        })
    }

    async fn transcode_rendition(
        &self,
        input: &Path,
        out_dir: &Path,
        rendition: &HlsRendition,
    ) -> MediaResult<()> {
        let rendition_dir = out_dir.join(rendition.name());
        tokio::fs::create_dir_all(&rendition_dir).await?;

        let playlist = rendition_dir.join("playlist.m3u8");
        let segments = rendition_dir.join("segment_%03d.ts");
        let bitrate = format!("{}k", rendition.bitrate_kbps);

        debug!(
            "Transcoding {} rung at {} for {}",
            rendition.name(),
            bitrate,
            input.display()
        );

        // -2 lets FFmpeg pick the width while keeping it even.
        let cmd = FfmpegCommand::new(input, &playlist)
            .video_filter(format!("scale=-2:{}", rendition.height))
            .output_args(self.encoding.to_ffmpeg_args())
            .output_args(["-b:v", &bitrate, "-maxrate", &bitrate])
            .output_args(["-bufsize", &format!("{}k", rendition.bitrate_kbps * 2)])
            .output_args(hls_args(&segments));

        self.runner().run(&cmd).await
    }
}

fn hls_args(segment_pattern: &Path) -> Vec<String> {
    vec![
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        HLS_SEGMENT_SECONDS.to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_segment_filename".to_string(),
        segment_pattern.to_string_lossy().to_string(),
    ]
}

/// Width of a rung scaled to `target_height`, aspect ratio preserved,
/// rounded to the nearest even pixel.
pub fn scaled_width(source_width: u32, source_height: u32, target_height: u32) -> u32 {
    if source_height == 0 {
        return 0;
    }
    let exact = source_width as f64 * target_height as f64 / source_height as f64;
    let rounded = exact.round() as u32;
    (rounded + 1) & !1
}

fn build_master_playlist(ladder: &[HlsRendition], source_width: u32, source_height: u32) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for rendition in ladder {
        let width = scaled_width(source_width, source_height, rendition.height);
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}/playlist.m3u8\n",
            rendition.bandwidth_bps(),
            width,
            rendition.height,
            rendition.name(),
        ));
    }
    playlist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_profile() {
        assert_eq!(LadderPolicy::for_profile("production"), LadderPolicy::Adaptive);
        assert_eq!(LadderPolicy::for_profile("development"), LadderPolicy::Single);
        assert_eq!(LadderPolicy::for_profile("test"), LadderPolicy::Single);
    }

    #[test]
    fn test_scaled_width_even() {
        // 1920x1080 source
        assert_eq!(scaled_width(1920, 1080, 480), 854);
        assert_eq!(scaled_width(1920, 1080, 720), 1280);
        assert_eq!(scaled_width(1920, 1080, 1080), 1920);
        // vertical video stays vertical
        assert_eq!(scaled_width(1080, 1920, 480), 270);
    }

    #[test]
    fn test_master_playlist_contents() {
        let playlist = build_master_playlist(&ADAPTIVE_LADDER, 1920, 1080);
        assert!(playlist.starts_with("#EXTM3U\n"));
        assert!(playlist.contains("BANDWIDTH=1000000,RESOLUTION=854x480"));
        assert!(playlist.contains("BANDWIDTH=2500000,RESOLUTION=1280x720"));
        assert!(playlist.contains("BANDWIDTH=5000000,RESOLUTION=1920x1080"));
        assert!(playlist.contains("720p/playlist.m3u8"));
    }

    #[test]
    fn test_hls_args() {
        let args = hls_args(Path::new("/tmp/out/segment_%03d.ts"));
        let t = args.iter().position(|a| a == "-hls_time").unwrap();
        assert_eq!(args[t + 1], "10");
        assert!(args.contains(&"vod".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }
}
