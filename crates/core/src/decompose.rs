use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::{debug, warn};

use crate::{
    cache::{get_frame_path, get_frames_dir},
    error::DecompositionError,
    media::MediaDecoder,
    sampling::SamplingParameters,
    types::{AudioSegment, Frame, MediaHandle},
};

/// Ordered audio windows and keyframes cut from one media file.
#[derive(Debug, Default)]
pub struct Decomposition {
    pub segments: Vec<AudioSegment>,
    pub frames: Vec<Frame>,
    /// Faults behind any sequence that came back empty.
    pub faults: Vec<DecompositionError>,
}

impl Decomposition {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Consecutive `[start, end)` windows covering `total_ms`; the last may be short.
pub fn segment_windows(total_ms: u64, segment_length_ms: u64) -> Vec<(u64, u64)> {
    if segment_length_ms == 0 {
        return Vec::new();
    }
    (0..total_ms)
        .step_by(segment_length_ms as usize)
        .map(|start| (start, (start + segment_length_ms).min(total_ms)))
        .collect()
}

/// Keyframe times `0, interval, 2*interval, ...` below the floored duration.
/// Any positive duration yields at least the frame at 0.
pub fn frame_timestamps(duration_seconds: f64, frame_interval_s: u64) -> Vec<u64> {
    if !(duration_seconds > 0.0) || frame_interval_s == 0 {
        return Vec::new();
    }
    let whole_seconds = duration_seconds.floor() as u64;
    let timestamps: Vec<u64> = (0..whole_seconds)
        .step_by(frame_interval_s as usize)
        .collect();
    if timestamps.is_empty() {
        vec![0]
    } else {
        timestamps
    }
}

pub struct MediaDecomposer {
    decoder: Arc<dyn MediaDecoder>,
}

impl MediaDecomposer {
    pub fn new(decoder: Arc<dyn MediaDecoder>) -> Self {
        Self { decoder }
    }

    /// Convert the media's audio track into the WAV that segments are cut from.
    pub async fn extract_audio(
        &self,
        media_path: &Path,
        audio_path: &Path,
    ) -> Result<(), DecompositionError> {
        self.decoder.extract_audio(media_path, audio_path).await
    }

    /// Partition the WAV at `audio_path` into `segment_length_ms` windows.
    pub fn split_audio(
        &self,
        audio_path: &Path,
        segment_length_ms: u64,
    ) -> Result<Vec<AudioSegment>, DecompositionError> {
        let reader = hound::WavReader::open(audio_path)?;
        let spec = reader.spec();
        check_pcm16_mono(audio_path, &spec)?;

        let total_ms = u64::from(reader.duration()) * 1000 / u64::from(spec.sample_rate);
        let segments: Vec<AudioSegment> = segment_windows(total_ms, segment_length_ms)
            .into_iter()
            .enumerate()
            .map(|(index, (start_ms, end_ms))| AudioSegment {
                index,
                start_ms,
                end_ms,
                source: audio_path.to_path_buf(),
            })
            .collect();

        debug!(total_ms, count = segments.len(), "audio split");
        Ok(segments)
    }

    /// Extract one still per interval into the work dir's frames directory.
    pub async fn sample_frames(
        &self,
        media: &MediaHandle,
        frame_interval_s: u64,
        work_dir: &Path,
    ) -> Result<Vec<Frame>, DecompositionError> {
        let timestamps = frame_timestamps(media.duration_seconds, frame_interval_s);
        if timestamps.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(get_frames_dir(work_dir)).await?;

        let mut frames = Vec::with_capacity(timestamps.len());
        for (index, at_seconds) in timestamps.into_iter().enumerate() {
            let path = get_frame_path(work_dir, index);
            self.decoder
                .extract_frame(&media.path, at_seconds, &path)
                .await?;
            frames.push(Frame {
                index,
                at_seconds,
                path,
            });
        }

        debug!(count = frames.len(), "frames sampled");
        Ok(frames)
    }

    /// Run both halves. A failing half yields an empty sequence and a recorded
    /// fault; whether that is fatal is the caller's decision.
    pub async fn decompose(
        &self,
        media: &MediaHandle,
        audio_path: &Path,
        params: SamplingParameters,
        work_dir: &Path,
    ) -> Decomposition {
        let mut decomposition = Decomposition::empty();

        match self.split_audio(audio_path, params.segment_length_ms) {
            Ok(segments) => decomposition.segments = segments,
            Err(e) => {
                warn!("Audio split failed: {}", e);
                decomposition.faults.push(e);
            }
        }

        match self
            .sample_frames(media, params.frame_interval_s, work_dir)
            .await
        {
            Ok(frames) => decomposition.frames = frames,
            Err(e) => {
                warn!("Frame sampling failed: {}", e);
                decomposition.faults.push(e);
            }
        }

        decomposition
    }
}

fn check_pcm16_mono(audio_path: &Path, spec: &hound::WavSpec) -> Result<(), DecompositionError> {
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
        || spec.sample_rate == 0
    {
        return Err(DecompositionError::UnsupportedAudio {
            audio_path: audio_path.to_path_buf(),
            reason: format!(
                "expected mono 16-bit PCM, got {} channel(s) {}-bit {:?} at {} Hz",
                spec.channels, spec.bits_per_sample, spec.sample_format, spec.sample_rate
            ),
        });
    }
    Ok(())
}

/// Write one segment's samples as a standalone WAV at `dest`.
pub fn write_segment_wav(
    segment: &AudioSegment,
    dest: &Path,
) -> Result<PathBuf, DecompositionError> {
    let mut reader = hound::WavReader::open(&segment.source)?;
    let spec = reader.spec();
    check_pcm16_mono(&segment.source, &spec)?;

    let rate = u64::from(spec.sample_rate);
    let start_sample = segment.start_ms * rate / 1000;
    let sample_count = (segment.end_ms * rate / 1000).saturating_sub(start_sample);
    reader.seek(start_sample as u32)?;

    let mut writer = hound::WavWriter::create(dest, spec)?;
    for sample in reader.samples::<i16>().take(sample_count as usize) {
        writer.write_sample(sample?)?;
    }
    writer.finalize()?;

    Ok(dest.to_path_buf())
}
