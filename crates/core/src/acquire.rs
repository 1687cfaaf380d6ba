use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{cache::get_video_template, error::AcquisitionError};

/// Resolves a video locator into a local media file inside `work_dir`.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(&self, locator: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError>;
}

/// Downloads with `yt-dlp`.
pub struct YtDlpAcquirer {
    binary: String,
}

impl YtDlpAcquirer {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for YtDlpAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Acquirer for YtDlpAcquirer {
    async fn acquire(&self, locator: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError> {
        let output_template = get_video_template(work_dir);
        debug!(binary = %self.binary, locator, "downloading video");

        let output = Command::new(&self.binary)
            .arg(locator)
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--extractor-args")
            .arg("youtube:player_client=android,web")
            .arg("-f")
            .arg("best")
            .arg("-o")
            .arg(&output_template)
            .output()
            .await?;

        if !output.status.success() {
            return Err(AcquisitionError::Failed {
                locator: locator.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
        let filepath = stdout_str.lines().last().unwrap_or("").trim();
        if filepath.is_empty() {
            return Err(AcquisitionError::MissingOutput {
                locator: locator.to_string(),
            });
        }

        Ok(PathBuf::from(filepath))
    }
}
