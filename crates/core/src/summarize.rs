use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::SummarizationError,
    provider::Provider,
    types::{Summary, TranscriptUnit},
};

static SUMMARY_SYSTEM_PROMPT: &str = r#"You summarize spoken video transcripts.

Write a concise prose summary of what the speaker covers, in the transcript's own language.
Ignore bracketed placeholders such as [Unintelligible].
Output ONLY the summary text: no headings, no lists, no preamble."#;

/// Condenses a block of text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, max_tokens: u32) -> Result<String, SummarizationError>;
}

/// Chat-completions summarizer for the configured provider.
pub struct ProviderSummarizer {
    provider: Provider,
    client: reqwest::Client,
}

impl ProviderSummarizer {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Summarizer for ProviderSummarizer {
    async fn summarize(&self, text: &str, max_tokens: u32) -> Result<String, SummarizationError> {
        let config = self.provider.config();
        let api_key = self.provider.validate_api_key()?;

        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({
                "model": config.model,
                "messages": [
                    {
                        "role": "system",
                        "content": SUMMARY_SYSTEM_PROMPT,
                    },
                    {
                        "role": "user",
                        "content": text,
                    },
                ],
                "max_tokens": max_tokens,
                "temperature": 0.3,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SummarizationError::InvalidResponse {
                reason: format!("no message content in {}", response),
            })?;

        Ok(content.trim().to_string())
    }
}

/// Keep at most `limit` whitespace-separated words.
pub fn truncate_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SummarizationDriver {
    summarizer: Arc<dyn Summarizer>,
    max_tokens: u32,
    word_limit: usize,
}

impl SummarizationDriver {
    pub fn new(summarizer: Arc<dyn Summarizer>, max_tokens: u32, word_limit: usize) -> Self {
        Self {
            summarizer,
            max_tokens,
            word_limit,
        }
    }

    /// One capability call over the whole transcript. Failure yields the
    /// unavailable sentinel instead of an error.
    pub async fn summarize(&self, units: &[TranscriptUnit]) -> Summary {
        let blob = units
            .iter()
            .map(|unit| unit.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        match self.summarizer.summarize(&blob, self.max_tokens).await {
            Ok(text) => {
                let text = truncate_words(&text, self.word_limit);
                debug!(words = text.split_whitespace().count(), "summary ready");
                Summary { text }
            }
            Err(e) => {
                warn!("Summarization failed: {}", e);
                Summary::unavailable()
            }
        }
    }
}
