use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const UNINTELLIGIBLE: &str = "[Unintelligible]";
pub const TRANSCRIPTION_FAILED: &str = "[Transcription failed]";
pub const SUMMARY_UNAVAILABLE: &str = "[Summary unavailable]";

/// A downloaded media file and its probed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaHandle {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// A fixed-length window of the derived audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    /// The full-length WAV this window is cut from.
    pub source: PathBuf,
}

impl AudioSegment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// A still image sampled from the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    pub at_seconds: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptUnit {
    pub index: usize,
    pub text: String,
}

impl TranscriptUnit {
    pub fn is_sentinel(&self) -> bool {
        self.text == UNINTELLIGIBLE || self.text == TRANSCRIPTION_FAILED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
}

impl Summary {
    pub fn unavailable() -> Self {
        Self {
            text: SUMMARY_UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    /// 1-based.
    pub number: usize,
    pub summary: Option<String>,
    pub body: String,
    pub frame: Option<Frame>,
}
