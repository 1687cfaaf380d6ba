use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use vidpages_core::{
    Collaborators, Config, Ffmpeg, PipelineOrchestrator, Provider, ProviderSummarizer,
    RunObserver, RunOutcome, RunRequest, RunState, SpeechToText, Summarizer, YtDlpAcquirer,
};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "vidpages")]
#[command(
    about = "Turn a video into a paginated document of keyframes and Whisper transcript"
)]
struct Cli {
    /// Video URL
    url: String,

    /// Sample coarsely and put an AI summary on the first page
    #[arg(short, long)]
    summary: bool,

    /// Output document path. Defaults to <output_dir>/<title>.md
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// AI provider for the summary (overrides the config file)
    #[arg(short, long)]
    provider: Option<CliProvider>,

    /// Force re-processing even if cached files exist
    #[arg(short, long)]
    force: bool,

    /// Config file. Defaults to ~/.config/vidpages/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Working directory for intermediate files
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn stage_messages(stage: RunState) -> (&'static str, &'static str) {
    match stage {
        RunState::Acquiring => ("Downloading video...", "Downloaded"),
        RunState::Probing => ("Probing duration...", "Duration probed"),
        RunState::Decomposing => (
            "Extracting audio and keyframes...",
            "Audio and keyframes extracted",
        ),
        RunState::Transcribing => ("Transcribing with Whisper...", "Transcribed"),
        RunState::Summarizing => ("Summarizing...", "Summary generated"),
        RunState::Assembling => ("Assembling document...", "Document assembled"),
        RunState::Finalizing => ("Cleaning up...", "Cleaned up"),
        RunState::Idle | RunState::Done | RunState::Failed => ("", ""),
    }
}

/// One spinner per stage.
#[derive(Default)]
struct SpinnerObserver {
    current: Mutex<Option<(ProgressBar, Instant)>>,
}

impl SpinnerObserver {
    fn take(&self) -> Option<(ProgressBar, Instant)> {
        self.current.lock().ok().and_then(|mut current| current.take())
    }
}

impl RunObserver for SpinnerObserver {
    fn stage_started(&self, stage: RunState) {
        let (running, _) = stage_messages(stage);
        if let Ok(mut current) = self.current.lock() {
            *current = Some((create_spinner(running), Instant::now()));
        }
    }

    fn stage_finished(&self, stage: RunState, cached: bool) {
        let (_, done) = stage_messages(stage);
        if let Some((pb, started)) = self.take() {
            let note = if cached {
                style("(cached)".to_string()).dim()
            } else {
                style(format!("[{}]", format_duration(started.elapsed()))).dim()
            };
            pb.finish_with_message(format!("{} {} {}", style("✓").green().bold(), done, note));
        }
    }

    fn stage_failed(&self, stage: RunState, error: &str) {
        if let Some((pb, _)) = self.take() {
            pb.finish_with_message(format!(
                "{} {} failed: {}",
                style("✗").red().bold(),
                stage.label(),
                style(error).dim()
            ));
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let mut config = config.with_env_overrides();

    if let Some(work_dir) = &cli.work_dir {
        config.pipeline.work_dir = work_dir.clone();
    }
    if let Some(provider) = &cli.provider {
        config.summary.provider = provider.clone().into();
    }
    tracing::debug!(
        config = ?cli.config,
        work_dir = %config.pipeline.work_dir.display(),
        provider = config.summary.provider.name(),
        "Loaded config"
    );
    Ok(config)
}

#[cfg(feature = "whisper")]
async fn build_speech_to_text(config: &Config) -> Result<Arc<dyn SpeechToText>> {
    use vidpages_core::{WhisperConfig, WhisperTranscriber, ensure_model, get_root_cache_dir};

    println!("{} Checking model...", style("✓").green().bold());
    let model_path = ensure_model(&get_root_cache_dir(), &config.stt.model).await?;

    let transcriber = WhisperTranscriber::new(WhisperConfig {
        model_path,
        language: config.stt.language.clone(),
        use_gpu: config.stt.use_gpu,
        threads: config.stt.threads,
    })?;
    Ok(Arc::new(transcriber))
}

#[cfg(not(feature = "whisper"))]
async fn build_speech_to_text(_config: &Config) -> Result<Arc<dyn SpeechToText>> {
    anyhow::bail!("vidpages was built without the `whisper` feature; no speech-to-text backend")
}

fn print_outcome(outcome: &RunOutcome, elapsed: Duration) {
    println!(
        "\n{} {} pages, {} keyframes, {} transcript segments from {}",
        style("Document:").dim(),
        style(outcome.page_count).cyan().bold(),
        outcome.frame_count,
        outcome.unit_count,
        vidpages_core::format_timestamp(outcome.duration_seconds)
    );
    println!(
        "{} {}",
        style("Total time:").dim(),
        style(format_duration(elapsed)).cyan().bold()
    );
    println!(
        "{} {}\n",
        style("Saved:").dim(),
        style(outcome.artifact.display()).cyan()
    );
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let provider = config.summary.provider;

    // Validate API key early
    if cli.summary {
        provider.validate_api_key()?;
    }

    println!(
        "\n{}  {}\n",
        style("vidpages").cyan().bold(),
        style("Video to Document").dim()
    );

    if cli.summary {
        println!(
            "{} Summary provider: {}",
            style("✓").green().bold(),
            provider.name()
        );
    }

    let stt = build_speech_to_text(&config).await?;
    println!("{}", style("─".repeat(60)).dim());

    let ffmpeg = Arc::new(Ffmpeg::new());
    let summarizer = cli
        .summary
        .then(|| Arc::new(ProviderSummarizer::new(provider)) as Arc<dyn Summarizer>);
    let collaborators = Collaborators {
        acquirer: Arc::new(YtDlpAcquirer::new()),
        probe: ffmpeg.clone(),
        decoder: ffmpeg,
        stt,
        summarizer,
    };
    let orchestrator = PipelineOrchestrator::new(collaborators, config.pipeline.clone())
        .with_observer(Arc::new(SpinnerObserver::default()));

    let request = RunRequest {
        locator: cli.url,
        summarize: cli.summary,
        force: cli.force,
        output: cli.output,
    };

    let total_start = Instant::now();
    let outcome = orchestrator.run(&request).await?;

    println!("{}", style("─".repeat(60)).dim());
    print_outcome(&outcome, total_start.elapsed());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}
