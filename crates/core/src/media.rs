//! Low-level media primitives backed by the ffmpeg toolchain.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{DecompositionError, ProbeError};

#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64, ProbeError>;
}

/// Decoding primitives the decomposer is built from.
#[async_trait]
pub trait MediaDecoder: Send + Sync {
    /// Write the audio track as 16 kHz mono 16-bit PCM WAV.
    async fn extract_audio(
        &self,
        media_path: &Path,
        audio_path: &Path,
    ) -> Result<(), DecompositionError>;

    /// Write one still frame taken at `at_seconds`.
    async fn extract_frame(
        &self,
        media_path: &Path,
        at_seconds: u64,
        frame_path: &Path,
    ) -> Result<(), DecompositionError>;
}

pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse ffprobe's bare `format=duration` output. Negative values clamp to 0.
pub fn parse_probe_output(media_path: &Path, stdout: &str) -> Result<f64, ProbeError> {
    let raw = stdout.trim();
    let duration: f64 = raw.parse().map_err(|_| ProbeError::Unparsable {
        media_path: media_path.to_path_buf(),
        raw: raw.to_string(),
    })?;
    if !duration.is_finite() {
        return Err(ProbeError::Unparsable {
            media_path: media_path.to_path_buf(),
            raw: raw.to_string(),
        });
    }
    Ok(duration.max(0.0))
}

#[async_trait]
impl DurationProbe for Ffmpeg {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64, ProbeError> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(media_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                media_path: media_path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_output(media_path, &String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl MediaDecoder for Ffmpeg {
    async fn extract_audio(
        &self,
        media_path: &Path,
        audio_path: &Path,
    ) -> Result<(), DecompositionError> {
        let output = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(media_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg(audio_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DecompositionError::AudioExtraction {
                media_path: media_path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    async fn extract_frame(
        &self,
        media_path: &Path,
        at_seconds: u64,
        frame_path: &Path,
    ) -> Result<(), DecompositionError> {
        let output = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-ss")
            .arg(at_seconds.to_string())
            .arg("-i")
            .arg(media_path)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg(frame_path)
            .output()
            .await?;

        // ffmpeg exits 0 without writing anything when seeking past the last frame
        if !output.status.success() || !frame_path.exists() {
            return Err(DecompositionError::FrameExtraction {
                at_seconds,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
