use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    cache::get_default_work_dir,
    document::PAGE_WORD_CAPACITY,
    error::{PipelineError, Result},
    provider::Provider,
    stt::DEFAULT_MODEL_NAME,
};

pub const SUMMARY_WORD_LIMIT: usize = 120;
pub const SUMMARY_MAX_TOKENS: u32 = 512;
pub const SEGMENT_TIMEOUT_SECS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub stt: SttConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub page_word_capacity: usize,
    pub summary_word_limit: usize,
    pub summary_max_tokens: u32,
    pub segment_timeout_secs: u64,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
    pub use_gpu: bool,
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SummaryConfig {
    pub provider: Provider,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: get_default_work_dir(),
            output_dir: PathBuf::from("."),
            page_word_capacity: PAGE_WORD_CAPACITY,
            summary_word_limit: SUMMARY_WORD_LIMIT,
            summary_max_tokens: SUMMARY_MAX_TOKENS,
            segment_timeout_secs: SEGMENT_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs.max(1))
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_NAME.to_string(),
            language: "auto".to_string(),
            use_gpu: true,
            threads: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| PipelineError::Config {
            reason: format!("invalid config {}: {}", path.display(), e),
        })
    }

    /// Defaults when the file is missing; invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(PipelineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VIDPAGES_WORK_DIR → pipeline.work_dir
    /// - VIDPAGES_MODEL → stt.model
    /// - VIDPAGES_LANGUAGE → stt.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(work_dir) = std::env::var("VIDPAGES_WORK_DIR")
            && !work_dir.is_empty()
        {
            self.pipeline.work_dir = PathBuf::from(work_dir);
        }

        if let Ok(model) = std::env::var("VIDPAGES_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("VIDPAGES_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        self
    }

    /// ~/.config/vidpages/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidpages")
            .join("config.toml")
    }
}
