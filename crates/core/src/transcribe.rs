use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::fs;
use tracing::{debug, warn};

use crate::{
    cache::{get_segment_path, get_segments_dir},
    decompose::write_segment_wav,
    error::SpeechError,
    stt::SpeechToText,
    types::{AudioSegment, TRANSCRIPTION_FAILED, TranscriptUnit, UNINTELLIGIBLE},
};

/// Drives speech-to-text over audio segments, one transient WAV at a time.
pub struct TranscriptionDriver {
    stt: Arc<dyn SpeechToText>,
    work_dir: PathBuf,
    segment_timeout: Duration,
}

impl TranscriptionDriver {
    pub fn new(stt: Arc<dyn SpeechToText>, work_dir: &Path, segment_timeout: Duration) -> Self {
        Self {
            stt,
            work_dir: work_dir.to_path_buf(),
            segment_timeout,
        }
    }

    /// One unit per segment, in segment order. Faults become sentinel text.
    pub async fn transcribe(&self, segments: &[AudioSegment]) -> Vec<TranscriptUnit> {
        if segments.is_empty() {
            return Vec::new();
        }

        if let Err(e) = fs::create_dir_all(get_segments_dir(&self.work_dir)).await {
            warn!("Cannot create segments dir: {}", e);
        }

        let mut units = Vec::with_capacity(segments.len());
        for segment in segments {
            let text = match self.transcribe_segment(segment).await {
                Ok(text) => text,
                Err(SpeechError::Unrecognized) => {
                    debug!(index = segment.index, "no speech recognized");
                    UNINTELLIGIBLE.to_string()
                }
                Err(e) => {
                    warn!(index = segment.index, "Segment transcription failed: {}", e);
                    TRANSCRIPTION_FAILED.to_string()
                }
            };
            units.push(TranscriptUnit {
                index: segment.index,
                text,
            });
        }
        units
    }

    async fn transcribe_segment(&self, segment: &AudioSegment) -> Result<String, SpeechError> {
        let transient = get_segment_path(&self.work_dir, segment.index);

        let materialized = {
            let segment = segment.clone();
            let dest = transient.clone();
            tokio::task::spawn_blocking(move || write_segment_wav(&segment, &dest)).await
        };

        let result = match materialized {
            Ok(Ok(path)) => self.call_with_timeout(&path).await,
            Ok(Err(e)) => Err(SpeechError::Failed {
                reason: format!("cannot materialize segment: {}", e),
            }),
            Err(e) => Err(SpeechError::Failed {
                reason: format!("segment writer panicked: {}", e),
            }),
        };

        if let Err(e) = fs::remove_file(&transient).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove transient segment {}: {}", transient.display(), e);
        }

        result
    }

    async fn call_with_timeout(&self, path: &Path) -> Result<String, SpeechError> {
        match tokio::time::timeout(self.segment_timeout, self.stt.transcribe(path)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(SpeechError::Unrecognized),
            Ok(result) => result.map(|text| text.trim().to_string()),
            Err(_) => Err(SpeechError::TimedOut {
                secs: self.segment_timeout.as_secs(),
            }),
        }
    }
}
