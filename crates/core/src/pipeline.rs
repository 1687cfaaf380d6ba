use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    acquire::Acquirer,
    cache::{find_video_in_cache, get_audio_path, get_frames_dir, get_segments_dir},
    config::PipelineConfig,
    decompose::{Decomposition, MediaDecomposer},
    document::{AssembledDocument, DocumentAssembler, MarkdownSink},
    error::{AcquisitionError, AssemblyError, CleanupError, PipelineError, Result},
    format::{DocumentMeta, sanitize_file_stem, title_from_locator},
    media::{DurationProbe, MediaDecoder},
    sampling::SamplingParameters,
    stt::SpeechToText,
    summarize::{SummarizationDriver, Summarizer},
    transcribe::TranscriptionDriver,
    types::{Frame, MediaHandle, Summary, TranscriptUnit},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Acquiring,
    Probing,
    Decomposing,
    Transcribing,
    Summarizing,
    Assembling,
    Finalizing,
    Done,
    Failed,
}

impl RunState {
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Acquiring => "acquiring",
            RunState::Probing => "probing",
            RunState::Decomposing => "decomposing",
            RunState::Transcribing => "transcribing",
            RunState::Summarizing => "summarizing",
            RunState::Assembling => "assembling",
            RunState::Finalizing => "finalizing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stage notifications for a caller that wants to show progress.
pub trait RunObserver: Send + Sync {
    fn stage_started(&self, _stage: RunState) {}

    /// `cached` is set when the stage reused an artifact from the work dir.
    fn stage_finished(&self, _stage: RunState, _cached: bool) {}

    fn stage_failed(&self, _stage: RunState, _error: &str) {}
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub locator: String,
    /// Coarse fixed sampling plus a summary on page 1.
    pub summarize: bool,
    /// Ignore artifacts left in the work dir.
    pub force: bool,
    pub output: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            summarize: false,
            force: false,
            output: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub artifact: PathBuf,
    pub page_count: usize,
    pub frame_count: usize,
    pub unit_count: usize,
    pub duration_seconds: f64,
    pub sampling: SamplingParameters,
}

struct PipelineRun {
    id: Uuid,
    state: RunState,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
        }
    }

    fn enter(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "stage transition");
        self.state = next;
    }
}

/// External capabilities a run depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub acquirer: Arc<dyn Acquirer>,
    pub probe: Arc<dyn DurationProbe>,
    pub decoder: Arc<dyn MediaDecoder>,
    pub stt: Arc<dyn SpeechToText>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

/// Sequences one run end to end and always cleans the work dir afterwards.
///
/// Artifacts in the work dir have fixed names, so one orchestrator (or any
/// other process) must not run concurrently against the same directory.
pub struct PipelineOrchestrator {
    collaborators: Collaborators,
    config: PipelineConfig,
    observer: Arc<dyn RunObserver>,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            collaborators,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        if request.summarize && self.collaborators.summarizer.is_none() {
            return Err(PipelineError::Config {
                reason: "summary requested but no summarizer configured".to_string(),
            });
        }

        let mut run = PipelineRun::new();
        let span = info_span!("run", run_id = %run.id);

        async {
            info!(locator = %request.locator, summarize = request.summarize, "run started");
            let result = self.produce(&mut run, request).await;

            self.begin(&mut run, RunState::Finalizing);
            self.finalize().await;
            self.observer.stage_finished(RunState::Finalizing, false);

            match &result {
                Ok(outcome) => {
                    run.enter(RunState::Done);
                    info!(
                        artifact = %outcome.artifact.display(),
                        pages = outcome.page_count,
                        "run finished"
                    );
                }
                Err(e) => {
                    run.enter(RunState::Failed);
                    warn!("Run failed: {}", e);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn produce(&self, run: &mut PipelineRun, request: &RunRequest) -> Result<RunOutcome> {
        let work_dir = self.config.work_dir.as_path();
        fs::create_dir_all(work_dir).await?;

        let media = match self.acquire_and_probe(run, request).await {
            Ok(media) => media,
            Err(cause) => {
                warn!("No usable media, skipping decomposition: {}", cause);
                return Err(PipelineError::EmptyArtifact {
                    cause: Box::new(cause),
                });
            }
        };

        let sampling = if request.summarize {
            SamplingParameters::SUMMARY_MODE
        } else {
            SamplingParameters::derive(media.duration_seconds)
        };
        debug!(
            segment_length_ms = sampling.segment_length_ms,
            frame_interval_s = sampling.frame_interval_s,
            "sampling selected"
        );

        self.begin(run, RunState::Decomposing);
        let (audio_cached, Decomposition { segments, frames, .. }) = self
            .decompose(&media, sampling, request.force)
            .await
            .map_err(|e| self.fail(RunState::Decomposing, e))?;
        self.observer.stage_finished(RunState::Decomposing, audio_cached);
        info!(segments = segments.len(), frames = frames.len(), "media decomposed");

        self.begin(run, RunState::Transcribing);
        let units = TranscriptionDriver::new(
            self.collaborators.stt.clone(),
            work_dir,
            self.config.segment_timeout(),
        )
        .transcribe(&segments)
        .await;
        self.observer.stage_finished(RunState::Transcribing, false);
        info!(
            units = units.len(),
            sentinels = units.iter().filter(|u| u.is_sentinel()).count(),
            "transcription finished"
        );

        let summary = match (&self.collaborators.summarizer, request.summarize) {
            (Some(summarizer), true) => {
                self.begin(run, RunState::Summarizing);
                let summary = SummarizationDriver::new(
                    summarizer.clone(),
                    self.config.summary_max_tokens,
                    self.config.summary_word_limit,
                )
                .summarize(&units)
                .await;
                self.observer.stage_finished(RunState::Summarizing, false);
                Some(summary)
            }
            _ => None,
        };

        self.begin(run, RunState::Assembling);
        let meta = DocumentMeta {
            title: title_from_locator(&request.locator),
            source: request.locator.clone(),
            duration_seconds: media.duration_seconds,
            sampling,
        };
        let output = request.output.clone().unwrap_or_else(|| {
            self.config
                .output_dir
                .join(format!("{}.md", sanitize_file_stem(&meta.title)))
        });
        let assembled = self
            .assemble(&meta, &output, &units, &frames, summary.as_ref())
            .await
            .map_err(|e| self.fail(RunState::Assembling, e))?;
        self.observer.stage_finished(RunState::Assembling, false);

        Ok(RunOutcome {
            run_id: run.id,
            artifact: assembled.artifact,
            page_count: assembled.page_count,
            frame_count: frames.len(),
            unit_count: units.len(),
            duration_seconds: media.duration_seconds,
            sampling,
        })
    }

    async fn acquire_and_probe(
        &self,
        run: &mut PipelineRun,
        request: &RunRequest,
    ) -> Result<MediaHandle> {
        self.begin(run, RunState::Acquiring);
        let (path, cached) = self
            .acquire(request)
            .await
            .map_err(|e| self.fail(RunState::Acquiring, e))?;
        self.observer.stage_finished(RunState::Acquiring, cached);
        info!(path = %path.display(), cached, "media acquired");

        self.begin(run, RunState::Probing);
        let duration_seconds = self
            .collaborators
            .probe
            .probe_duration(&path)
            .await
            .map_err(|e| self.fail(RunState::Probing, e))?;
        self.observer.stage_finished(RunState::Probing, false);
        info!(duration_seconds, "duration probed");

        Ok(MediaHandle {
            path,
            duration_seconds,
        })
    }

    async fn acquire(
        &self,
        request: &RunRequest,
    ) -> std::result::Result<(PathBuf, bool), AcquisitionError> {
        let work_dir = self.config.work_dir.as_path();
        if !request.force
            && let Some(cached) = find_video_in_cache(work_dir)
        {
            return Ok((cached, true));
        }

        let path = self
            .collaborators
            .acquirer
            .acquire(&request.locator, work_dir)
            .await?;
        if !path.exists() {
            return Err(AcquisitionError::MissingOutput {
                locator: request.locator.clone(),
            });
        }
        Ok((path, false))
    }

    async fn decompose(
        &self,
        media: &MediaHandle,
        sampling: SamplingParameters,
        force: bool,
    ) -> Result<(bool, Decomposition)> {
        let work_dir = self.config.work_dir.as_path();
        let decomposer = MediaDecomposer::new(self.collaborators.decoder.clone());

        let audio_path = get_audio_path(work_dir);
        let audio_cached = !force && audio_path.exists();
        if !audio_cached {
            decomposer.extract_audio(&media.path, &audio_path).await?;
        }

        let mut decomposition = decomposer
            .decompose(media, &audio_path, sampling, work_dir)
            .await;
        if !decomposition.faults.is_empty() {
            return Err(decomposition.faults.remove(0).into());
        }
        Ok((audio_cached, decomposition))
    }

    async fn assemble(
        &self,
        meta: &DocumentMeta,
        output: &Path,
        units: &[TranscriptUnit],
        frames: &[Frame],
        summary: Option<&Summary>,
    ) -> std::result::Result<AssembledDocument, AssemblyError> {
        let assembler = DocumentAssembler::new(self.config.page_word_capacity);
        let mut sink = MarkdownSink::create(output, meta).await?;
        assembler.assemble(units, frames, summary, &mut sink).await
    }

    /// Remove every intermediate: frames, transient segments, the derived
    /// audio and the media file. Faults are logged only.
    async fn finalize(&self) {
        let work_dir = self.config.work_dir.as_path();
        let mut targets = vec![
            get_frames_dir(work_dir),
            get_segments_dir(work_dir),
            get_audio_path(work_dir),
        ];
        targets.extend(media_artifacts(work_dir).await);

        let mut removed = 0;
        for target in targets {
            match remove_artifact(&target).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Cleanup failed: {}", e),
            }
        }
        debug!(removed, "work dir cleaned");
    }

    fn begin(&self, run: &mut PipelineRun, stage: RunState) {
        run.enter(stage);
        self.observer.stage_started(stage);
    }

    fn fail(&self, stage: RunState, error: impl Into<PipelineError>) -> PipelineError {
        let error = error.into();
        self.observer.stage_failed(stage, &error.to_string());
        error
    }
}

/// The media file plus any downloader leftovers (`video.mp4.part`, ...).
async fn media_artifacts(work_dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(mut entries) = fs::read_dir(work_dir).await else {
        return found;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with("video.") {
            found.push(entry.path());
        }
    }
    found
}

/// `Ok(false)` when there was nothing to remove.
async fn remove_artifact(path: &Path) -> std::result::Result<bool, CleanupError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
