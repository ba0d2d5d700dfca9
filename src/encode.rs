/*!
 * Video encoder hand-off.
 *
 * The encoder is an external collaborator: the pipeline hands it a
 * (video, styled track, bitrate, encoder family) tuple and consumes the
 * result. Bitrate comes from a fixed resolution-bucket table computed from
 * the video's reported height - it is not negotiated with the encoder.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info};
use serde_json::{from_str, Value};
use tokio::process::Command;

/// Encoder codec family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderFamily {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
}

impl EncoderFamily {
    /// ffmpeg encoder name of the family
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Hevc => "libx265",
        }
    }
}

/// Everything the encoder collaborator needs for one burn-in job
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Input video
    pub video_path: PathBuf,

    /// Styled subtitle track to burn in
    pub styled_track_path: PathBuf,

    /// Output video
    pub output_path: PathBuf,

    /// Target bitrate, e.g. "5000k"
    pub target_bitrate: String,

    /// Codec family directive
    pub encoder_family: EncoderFamily,
}

/// Target bitrate for a video height, by fixed resolution bucket
pub fn bitrate_for_height(height: u32) -> &'static str {
    match height {
        0..=480 => "1500k",
        481..=720 => "3000k",
        721..=1080 => "5000k",
        1081..=1440 => "6500k",
        _ => "8000k",
    }
}

/// External video encoder collaborator
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Burn the styled track into the video
    async fn burn_in(&self, job: &EncodeJob) -> Result<()>;
}

/// ffmpeg-backed encoder
pub struct FfmpegEncoder {
    /// Hard ceiling on one encode run
    timeout: Duration,
}

impl FfmpegEncoder {
    /// Create an encoder with the given per-job timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new(Duration::from_secs(7200))
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn burn_in(&self, job: &EncodeJob) -> Result<()> {
        info!(
            "Encoding {} with {} at {}",
            job.video_path.display(),
            job.encoder_family.ffmpeg_name(),
            job.target_bitrate
        );

        let filter = format!(
            "ass=filename='{}'",
            job.styled_track_path.to_string_lossy().replace('\'', r"\'")
        );

        let ffmpeg_future = Command::new("ffmpeg")
            .args([
                "-y",
                "-hide_banner",
                "-loglevel", "error",
                "-i", job.video_path.to_str().unwrap_or_default(),
                "-vf", &filter,
                "-c:a", "copy",
                "-c:v", job.encoder_family.ffmpeg_name(),
                "-b:v", &job.target_bitrate,
                "-preset", "medium",
                job.output_path.to_str().unwrap_or_default(),
            ])
            .output();

        let result = tokio::select! {
            result = ffmpeg_future => {
                result.context("Failed to execute ffmpeg for subtitle burn-in")?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(anyhow!("ffmpeg encode timed out after {:?}", self.timeout));
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!("ffmpeg encode failed: {}", stderr.trim());
            return Err(anyhow!("ffmpeg encode failed: {}", stderr.trim()));
        }

        Ok(())
    }
}

/// Probe the vertical resolution of a video with ffprobe
pub async fn probe_video_height<P: AsRef<Path>>(video_path: P) -> Result<u32> {
    let video_path = video_path.as_ref();

    if !video_path.exists() {
        return Err(anyhow!("Video file not found: {:?}", video_path));
    }

    let ffprobe_future = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-select_streams", "v:0",
            video_path.to_str().unwrap_or(""),
        ])
        .output();

    let timeout_duration = Duration::from_secs(60);
    let output = tokio::select! {
        result = ffprobe_future => {
            result.context("Failed to execute ffprobe command")?
        },
        _ = tokio::time::sleep(timeout_duration) => {
            return Err(anyhow!("ffprobe command timed out after 60 seconds"));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe command failed: {}", stderr));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: Value = from_str(&stdout).context("Failed to parse ffprobe JSON output")?;

    json.get("streams")
        .and_then(|s| s.as_array())
        .and_then(|streams| streams.first())
        .and_then(|stream| stream.get("height"))
        .and_then(|h| h.as_u64())
        .map(|h| h as u32)
        .ok_or_else(|| anyhow!("No video stream height reported for {:?}", video_path))
}
