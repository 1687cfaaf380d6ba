use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tempfile::TempDir;
use vidpages_core::{
    Acquirer, Collaborators, DurationProbe, MediaDecoder, PipelineError, PipelineOrchestrator,
    RunObserver, RunRequest, RunState, SamplingParameters, SpeechToText, Summarizer,
    config::PipelineConfig,
    error::{
        AcquisitionError, AssemblyError, DecompositionError, ProbeError, SpeechError,
        SummarizationError,
    },
    types::TRANSCRIPTION_FAILED,
};

#[derive(Default)]
struct CountingAcquirer {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Acquirer for CountingAcquirer {
    async fn acquire(&self, locator: &str, work_dir: &Path) -> Result<PathBuf, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AcquisitionError::Failed {
                locator: locator.to_string(),
                reason: "Video unavailable".to_string(),
            });
        }
        let path = work_dir.join("video.mp4");
        std::fs::write(&path, b"not really a video")?;
        Ok(path)
    }
}

struct FixedProbe(Option<f64>);

#[async_trait]
impl DurationProbe for FixedProbe {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64, ProbeError> {
        self.0.ok_or_else(|| ProbeError::Unparsable {
            media_path: media_path.to_path_buf(),
            raw: "N/A".to_string(),
        })
    }
}

/// Writes silent 16 kHz mono audio of `audio_ms` and a stub JPEG per frame.
struct FakeDecoder {
    audio_ms: u64,
    fail_frames: bool,
    audio_calls: AtomicUsize,
}

impl FakeDecoder {
    fn new(audio_ms: u64) -> Self {
        Self {
            audio_ms,
            fail_frames: false,
            audio_calls: AtomicUsize::new(0),
        }
    }
}

fn write_silence(path: &Path, audio_ms: u64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..audio_ms * 16 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[async_trait]
impl MediaDecoder for FakeDecoder {
    async fn extract_audio(
        &self,
        _media_path: &Path,
        audio_path: &Path,
    ) -> Result<(), DecompositionError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        write_silence(audio_path, self.audio_ms);
        Ok(())
    }

    async fn extract_frame(
        &self,
        _media_path: &Path,
        at_seconds: u64,
        frame_path: &Path,
    ) -> Result<(), DecompositionError> {
        if self.fail_frames {
            return Err(DecompositionError::FrameExtraction {
                at_seconds,
                reason: "Invalid data found when processing input".to_string(),
            });
        }
        std::fs::write(frame_path, [0xFF, 0xD8, 0xFF, 0xE0])?;
        Ok(())
    }
}

/// Answers `segment N speech` for call N, failing on `fail_on`.
#[derive(Default)]
struct ScriptedStt {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, SpeechError> {
        assert!(audio_path.exists());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(call) {
            return Err(SpeechError::Failed {
                reason: "decoder crashed".to_string(),
            });
        }
        Ok(format!("segment {} speech", call))
    }
}

struct FixedSummarizer;

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, text: &str, _max_tokens: u32) -> Result<String, SummarizationError> {
        Ok(format!("A talk in {} words.", text.split_whitespace().count()))
    }
}

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<RunState>>,
    cached: Mutex<Vec<RunState>>,
    failed: Mutex<Vec<RunState>>,
}

impl RunObserver for RecordingObserver {
    fn stage_started(&self, stage: RunState) {
        self.started.lock().unwrap().push(stage);
    }

    fn stage_finished(&self, stage: RunState, cached: bool) {
        if cached {
            self.cached.lock().unwrap().push(stage);
        }
    }

    fn stage_failed(&self, stage: RunState, _error: &str) {
        self.failed.lock().unwrap().push(stage);
    }
}

struct Harness {
    work: TempDir,
    out: TempDir,
    acquirer: Arc<CountingAcquirer>,
    decoder: Arc<FakeDecoder>,
    stt: Arc<ScriptedStt>,
    observer: Arc<RecordingObserver>,
}

impl Harness {
    fn new(decoder: FakeDecoder) -> Self {
        Self {
            work: tempfile::tempdir().unwrap(),
            out: tempfile::tempdir().unwrap(),
            acquirer: Arc::new(CountingAcquirer::default()),
            decoder: Arc::new(decoder),
            stt: Arc::new(ScriptedStt::default()),
            observer: Arc::new(RecordingObserver::default()),
        }
    }

    fn orchestrator(
        &self,
        duration: Option<f64>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> PipelineOrchestrator {
        let collaborators = Collaborators {
            acquirer: self.acquirer.clone(),
            probe: Arc::new(FixedProbe(duration)),
            decoder: self.decoder.clone(),
            stt: self.stt.clone(),
            summarizer,
        };
        let config = PipelineConfig {
            work_dir: self.work.path().to_path_buf(),
            output_dir: self.out.path().to_path_buf(),
            ..Default::default()
        };
        PipelineOrchestrator::new(collaborators, config).with_observer(self.observer.clone())
    }

    fn output(&self) -> PathBuf {
        self.out.path().join("doc.md")
    }

    fn request(&self) -> RunRequest {
        RunRequest {
            output: Some(self.output()),
            ..RunRequest::new("https://www.youtube.com/watch?v=abc123")
        }
    }

    fn leftovers(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.work.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[tokio::test]
async fn test_run_produces_document_and_cleans_work_dir() {
    let harness = Harness::new(FakeDecoder::new(35_000));

    let outcome = harness
        .orchestrator(Some(35.0), None)
        .run(&harness.request())
        .await
        .unwrap();

    assert_eq!(outcome.artifact, harness.output());
    assert_eq!(outcome.sampling, SamplingParameters::derive(35.0));
    assert_eq!(outcome.unit_count, 4);
    assert_eq!(outcome.frame_count, 4);
    assert_eq!(outcome.page_count, 4);

    let document = std::fs::read_to_string(harness.output()).unwrap();
    assert!(document.starts_with("# Video abc123\n"));
    assert!(document.contains("segment 0 speech segment 1 speech"));
    assert_eq!(document.matches("data:image/jpeg;base64,").count(), 4);
    assert!(!document.contains("**Summary:**"));

    assert!(harness.leftovers().is_empty(), "{:?}", harness.leftovers());
    assert!(
        !harness
            .observer
            .started
            .lock()
            .unwrap()
            .contains(&RunState::Summarizing)
    );
}

#[tokio::test]
async fn test_existing_artifacts_are_reused() {
    let harness = Harness::new(FakeDecoder::new(12_000));
    std::fs::write(harness.work.path().join("video.webm"), b"cached").unwrap();
    write_silence(&harness.work.path().join("audio.wav"), 12_000);

    harness
        .orchestrator(Some(12.0), None)
        .run(&harness.request())
        .await
        .unwrap();

    assert_eq!(harness.acquirer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.decoder.audio_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *harness.observer.cached.lock().unwrap(),
        vec![RunState::Acquiring, RunState::Decomposing]
    );
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_force_ignores_existing_artifacts() {
    let harness = Harness::new(FakeDecoder::new(12_000));
    std::fs::write(harness.work.path().join("video.mp4"), b"stale").unwrap();
    write_silence(&harness.work.path().join("audio.wav"), 1_000);

    let request = RunRequest {
        force: true,
        ..harness.request()
    };
    let outcome = harness
        .orchestrator(Some(12.0), None)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(harness.acquirer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.decoder.audio_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.unit_count, 2);
}

#[tokio::test]
async fn test_failed_segment_becomes_sentinel_and_run_completes() {
    let mut harness = Harness::new(FakeDecoder::new(50_000));
    harness.stt = Arc::new(ScriptedStt {
        fail_on: Some(1),
        ..Default::default()
    });

    let outcome = harness
        .orchestrator(Some(50.0), None)
        .run(&harness.request())
        .await
        .unwrap();

    assert_eq!(outcome.unit_count, 5);
    let document = std::fs::read_to_string(&outcome.artifact).unwrap();
    let first = document.find("segment 0 speech").unwrap();
    let failed = document.find(TRANSCRIPTION_FAILED).unwrap();
    let last = document.find("segment 4 speech").unwrap();
    assert!(first < failed && failed < last);
    assert!(
        harness
            .observer
            .started
            .lock()
            .unwrap()
            .contains(&RunState::Assembling)
    );
}

#[tokio::test]
async fn test_zero_duration_yields_empty_document() {
    let harness = Harness::new(FakeDecoder::new(0));

    let outcome = harness
        .orchestrator(Some(0.0), None)
        .run(&harness.request())
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 0);
    assert_eq!(outcome.unit_count, 0);
    assert_eq!(outcome.frame_count, 0);
    assert_eq!(harness.stt.calls.load(Ordering::SeqCst), 0);
    let document = std::fs::read_to_string(&outcome.artifact).unwrap();
    assert!(!document.contains("## Page"));
}

#[tokio::test]
async fn test_summary_mode_samples_coarsely_and_leads_with_summary() {
    let harness = Harness::new(FakeDecoder::new(35_000));
    let request = RunRequest {
        summarize: true,
        ..harness.request()
    };

    let outcome = harness
        .orchestrator(Some(35.0), Some(Arc::new(FixedSummarizer)))
        .run(&request)
        .await
        .unwrap();

    assert_eq!(outcome.sampling, SamplingParameters::SUMMARY_MODE);
    assert_eq!(outcome.unit_count, 1);
    assert_eq!(outcome.page_count, 1);
    let document = std::fs::read_to_string(&outcome.artifact).unwrap();
    assert!(document.contains("## Page 1\n\n> **Summary:** A talk in 3 words.\n"));
    assert_eq!(document.matches("**Summary:**").count(), 1);
}

#[tokio::test]
async fn test_summary_without_summarizer_is_rejected_up_front() {
    let harness = Harness::new(FakeDecoder::new(10_000));
    let request = RunRequest {
        summarize: true,
        ..harness.request()
    };

    let result = harness.orchestrator(Some(10.0), None).run(&request).await;

    assert!(matches!(result, Err(PipelineError::Config { .. })));
    assert_eq!(harness.acquirer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_acquisition_failure_reports_empty_artifact() {
    let mut harness = Harness::new(FakeDecoder::new(10_000));
    harness.acquirer = Arc::new(CountingAcquirer {
        fail: true,
        ..Default::default()
    });

    let result = harness
        .orchestrator(Some(10.0), None)
        .run(&harness.request())
        .await;

    match result {
        Err(PipelineError::EmptyArtifact { cause }) => {
            assert!(matches!(*cause, PipelineError::Acquisition(_)));
        }
        other => panic!("expected empty artifact, got {:?}", other.map(|o| o.artifact)),
    }
    assert!(!harness.output().exists());
    let started = harness.observer.started.lock().unwrap();
    assert!(!started.contains(&RunState::Decomposing));
    assert_eq!(started.last(), Some(&RunState::Finalizing));
    assert_eq!(harness.decoder.audio_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_probe_failure_still_cleans_up_media() {
    let harness = Harness::new(FakeDecoder::new(10_000));

    let result = harness
        .orchestrator(None, None)
        .run(&harness.request())
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::EmptyArtifact { ref cause })
            if matches!(**cause, PipelineError::Probe(_))
    ));
    assert_eq!(
        *harness.observer.failed.lock().unwrap(),
        vec![RunState::Probing]
    );
    assert_eq!(harness.decoder.audio_calls.load(Ordering::SeqCst), 0);
    assert!(harness.leftovers().is_empty());
    assert!(!harness.output().exists());
}

#[tokio::test]
async fn test_decomposition_fault_aborts_and_cleans_up() {
    let harness = Harness::new(FakeDecoder {
        fail_frames: true,
        ..FakeDecoder::new(20_000)
    });

    let result = harness
        .orchestrator(Some(20.0), None)
        .run(&harness.request())
        .await;

    assert!(matches!(result, Err(PipelineError::Decomposition(_))));
    assert_eq!(harness.stt.calls.load(Ordering::SeqCst), 0);
    assert!(harness.leftovers().is_empty(), "{:?}", harness.leftovers());
    assert!(!harness.output().exists());
}

#[tokio::test]
async fn test_assembly_fault_leaves_no_artifact_and_cleans_up() {
    let harness = Harness::new(FakeDecoder::new(20_000));
    let blocker = harness.out.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let request = RunRequest {
        output: Some(blocker.join("doc.md")),
        ..harness.request()
    };

    let result = harness.orchestrator(Some(20.0), None).run(&request).await;

    assert!(matches!(
        result,
        Err(PipelineError::Assembly(AssemblyError::Write { .. }))
    ));
    assert_eq!(harness.stt.calls.load(Ordering::SeqCst), 2);
    assert!(harness.leftovers().is_empty(), "{:?}", harness.leftovers());
}

#[tokio::test]
async fn test_default_output_name_comes_from_locator() {
    let harness = Harness::new(FakeDecoder::new(5_000));
    let request = RunRequest::new("https://youtu.be/Xy_Z9");

    let outcome = harness
        .orchestrator(Some(5.0), None)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(outcome.artifact, harness.out.path().join("video-xy-z9.md"));
    assert!(outcome.artifact.exists());
}

#[tokio::test]
async fn test_timestamped_locators_get_distinct_output_names() {
    let harness = Harness::new(FakeDecoder::new(5_000));
    let orchestrator = harness.orchestrator(Some(5.0), None);

    let first = orchestrator
        .run(&RunRequest::new("https://www.youtube.com/watch?v=first&t=42s"))
        .await
        .unwrap();
    let second = orchestrator
        .run(&RunRequest {
            force: true,
            ..RunRequest::new("https://www.youtube.com/watch?v=second&t=42s")
        })
        .await
        .unwrap();

    assert_eq!(first.artifact, harness.out.path().join("video-first.md"));
    assert_eq!(second.artifact, harness.out.path().join("video-second.md"));
    assert!(first.artifact.exists());
    assert!(second.artifact.exists());
}
