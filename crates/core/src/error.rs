use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Download failed for {locator}: {reason}")]
    Failed { locator: String, reason: String },

    #[error("Downloader produced no media file for {locator}")]
    MissingOutput { locator: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Duration probe failed for {media_path}: {reason}")]
    Failed { media_path: PathBuf, reason: String },

    #[error("Unparsable duration {raw:?} reported for {media_path}")]
    Unparsable { media_path: PathBuf, raw: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DecompositionError {
    #[error("Audio extraction failed for {media_path}: {reason}")]
    AudioExtraction { media_path: PathBuf, reason: String },

    #[error("Frame extraction failed at {at_seconds}s: {reason}")]
    FrameExtraction { at_seconds: u64, reason: String },

    #[error("Unsupported audio format in {audio_path}: {reason}")]
    UnsupportedAudio { audio_path: PathBuf, reason: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-segment speech-to-text fault. Never aborts a run.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("No recognizable speech")]
    Unrecognized,

    #[error("Speech-to-text failed: {reason}")]
    Failed { reason: String },

    #[error("Speech-to-text timed out after {secs}s")]
    TimedOut { secs: u64 },
}

#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Invalid API response: {reason}")]
    InvalidResponse { reason: String },
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Failed to read frame image {path}: {source}")]
    FrameRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
#[error("Failed to remove {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Faults that decide the outcome reported to the caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Decomposition(#[from] DecompositionError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// No usable media reached decomposition.
    #[error("Artifact likely empty: {cause}")]
    EmptyArtifact {
        #[source]
        cause: Box<PipelineError>,
    },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
