pub mod acquire;
pub mod cache;
pub mod config;
pub mod decompose;
pub mod document;
pub mod error;
pub mod format;
pub mod media;
pub mod pipeline;
pub mod provider;
pub mod sampling;
pub mod stt;
pub mod summarize;
pub mod transcribe;
pub mod types;

pub use acquire::{Acquirer, YtDlpAcquirer};
pub use cache::{get_default_work_dir, get_root_cache_dir};
pub use config::Config;
pub use document::{DocumentAssembler, DocumentSink, MarkdownSink};
pub use error::{PipelineError, Result};
pub use format::format_timestamp;
pub use media::{DurationProbe, Ffmpeg, MediaDecoder};
pub use pipeline::{
    Collaborators, NoopObserver, PipelineOrchestrator, RunObserver, RunOutcome, RunRequest,
    RunState,
};
pub use provider::{Provider, ProviderConfig};
pub use sampling::SamplingParameters;
pub use stt::{SpeechToText, WhisperConfig, ensure_model};
#[cfg(feature = "whisper")]
pub use stt::WhisperTranscriber;
pub use summarize::{ProviderSummarizer, Summarizer};
pub use types::{AudioSegment, DocumentPage, Frame, MediaHandle, Summary, TranscriptUnit};
