use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::info;

use crate::{
    cache::get_model_dir,
    error::{PipelineError, Result, SpeechError},
};

pub const DEFAULT_MODEL_NAME: &str = "ggml-base-q5_1.bin";

/// Turns one audio file into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Blank speech must be reported as [`SpeechError::Unrecognized`].
    async fn transcribe(&self, audio_path: &Path) -> std::result::Result<String, SpeechError>;
}

/// Download the ggml model into the cache on first use.
pub async fn ensure_model(cache_dir: &Path, model_name: &str) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_name
    );
    let model_dir = get_model_dir(cache_dir);

    if !model_dir.exists() {
        fs::create_dir_all(&model_dir).await?;
    }

    let model_path = model_dir.join(model_name);
    if !model_path.exists() {
        info!(url = %download_url, "downloading whisper model");
        let output = Command::new("curl")
            .arg("-fL")
            .arg(&download_url)
            .arg("-o")
            .arg(&model_path)
            .output()
            .await?;

        if !output.status.success() {
            let _ = fs::remove_file(&model_path).await;
            return Err(PipelineError::Config {
                reason: format!(
                    "model download from {} failed: {}",
                    download_url,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
    }

    Ok(model_path)
}

/// Read a 16-bit PCM WAV as normalized f32 samples.
pub fn read_wav_f32(audio_path: &Path) -> std::result::Result<Vec<f32>, SpeechError> {
    let mut reader = hound::WavReader::open(audio_path).map_err(|e| SpeechError::Failed {
        reason: format!("cannot open {}: {}", audio_path.display(), e),
    })?;
    reader
        .samples::<i16>()
        .map(|s| {
            s.map(|s| s as f32 / i16::MAX as f32)
                .map_err(|e| SpeechError::Failed {
                    reason: format!("cannot decode {}: {}", audio_path.display(), e),
                })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub model_path: PathBuf,
    /// `"auto"` lets Whisper detect the language.
    pub language: String,
    pub use_gpu: bool,
    pub threads: Option<usize>,
}

#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;

#[cfg(feature = "whisper")]
mod whisper {
    use std::{
        path::Path,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    use super::{SpeechToText, WhisperConfig, read_wav_f32};
    use crate::error::{PipelineError, SpeechError};

    /// Local Whisper inference over one shared context.
    ///
    /// Inference runs on the blocking pool and cannot be cancelled. When a
    /// caller times out, the abandoned job keeps the context lock until it
    /// completes, so the next segment waits behind it and may time out too.
    pub struct WhisperTranscriber {
        context: Arc<Mutex<WhisperContext>>,
        config: WhisperConfig,
    }

    impl WhisperTranscriber {
        pub fn new(config: WhisperConfig) -> crate::error::Result<Self> {
            whisper_rs::install_logging_hooks();

            let model_path = config.model_path.to_str().ok_or_else(|| PipelineError::Config {
                reason: "Invalid UTF-8 in model path".to_string(),
            })?;

            let mut ctx_params = WhisperContextParameters::default();
            ctx_params.use_gpu(config.use_gpu);
            ctx_params.flash_attn(true);

            let context = WhisperContext::new_with_params(model_path, ctx_params).map_err(|e| {
                PipelineError::Config {
                    reason: format!("Failed to load Whisper model {}: {}", model_path, e),
                }
            })?;

            Ok(Self {
                context: Arc::new(Mutex::new(context)),
                config,
            })
        }

        fn run(
            context: &Mutex<WhisperContext>,
            config: &WhisperConfig,
            samples: &[f32],
        ) -> Result<String, SpeechError> {
            let context = context.lock().map_err(|e| SpeechError::Failed {
                reason: format!("Failed to acquire Whisper context: {}", e),
            })?;
            let mut state = context.create_state().map_err(|e| SpeechError::Failed {
                reason: format!("Failed to create Whisper state: {}", e),
            })?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if config.language == "auto" {
                params.set_language(None);
            } else {
                params.set_language(Some(&config.language));
            }
            if let Some(threads) = config.threads {
                params.set_n_threads(threads as i32);
            }
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            state.full(params, samples).map_err(|e| SpeechError::Failed {
                reason: format!("Whisper inference failed: {}", e),
            })?;

            let mut text = String::new();
            for segment in state.as_iter() {
                text.push_str(&segment.to_string());
            }
            Ok(text.trim().to_string())
        }
    }

    #[async_trait]
    impl SpeechToText for WhisperTranscriber {
        async fn transcribe(&self, audio_path: &Path) -> Result<String, SpeechError> {
            let samples = read_wav_f32(audio_path)?;
            if samples.is_empty() {
                return Err(SpeechError::Unrecognized);
            }

            let context = Arc::clone(&self.context);
            let config = self.config.clone();
            let text = tokio::task::spawn_blocking(move || Self::run(&context, &config, &samples))
                .await
                .map_err(|e| SpeechError::Failed {
                    reason: format!("Whisper worker panicked: {}", e),
                })??;

            if text.is_empty() {
                return Err(SpeechError::Unrecognized);
            }
            Ok(text)
        }
    }
}
