use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{debug, warn};

use crate::{
    error::AssemblyError,
    format::{DocumentMeta, render_header, render_page},
    summarize::truncate_words,
    types::{DocumentPage, Frame, Summary, TranscriptUnit},
};

pub const PAGE_WORD_CAPACITY: usize = 120;

/// Receives pages in order and produces one artifact.
#[async_trait]
pub trait DocumentSink: Send {
    async fn write_page(&mut self, page: &DocumentPage) -> Result<(), AssemblyError>;

    /// Flush and publish the artifact. Nothing exists at the final path before this.
    async fn finish(&mut self) -> Result<PathBuf, AssemblyError>;

    /// Discard whatever was written so far.
    async fn abort(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub artifact: PathBuf,
    pub page_count: usize,
}

pub struct DocumentAssembler {
    page_capacity: usize,
}

impl DocumentAssembler {
    pub fn new(page_capacity: usize) -> Self {
        Self {
            page_capacity: page_capacity.max(1),
        }
    }

    /// Lay out pages. Body text is re-chunked into fixed word groups, frames
    /// pair with groups by position, and the summary (cut to one page) rides
    /// on page 1. Pages = max(groups, frames), at least 1 when a summary exists.
    pub fn paginate(
        &self,
        units: &[TranscriptUnit],
        frames: &[Frame],
        summary: Option<&Summary>,
    ) -> Vec<DocumentPage> {
        let words: Vec<&str> = units
            .iter()
            .flat_map(|unit| unit.text.split_whitespace())
            .collect();
        let groups: Vec<String> = words
            .chunks(self.page_capacity)
            .map(|group| group.join(" "))
            .collect();

        let summary_excerpt = summary
            .map(|s| truncate_words(&s.text, self.page_capacity))
            .filter(|s| !s.is_empty());

        let mut page_count = groups.len().max(frames.len());
        if summary_excerpt.is_some() {
            page_count = page_count.max(1);
        }

        (0..page_count)
            .map(|i| DocumentPage {
                number: i + 1,
                summary: if i == 0 { summary_excerpt.clone() } else { None },
                body: groups.get(i).cloned().unwrap_or_default(),
                frame: frames.get(i).cloned(),
            })
            .collect()
    }

    /// Write every page to `sink` in order. On any failure the sink is aborted
    /// and no artifact is left behind.
    pub async fn assemble(
        &self,
        units: &[TranscriptUnit],
        frames: &[Frame],
        summary: Option<&Summary>,
        sink: &mut dyn DocumentSink,
    ) -> Result<AssembledDocument, AssemblyError> {
        let pages = self.paginate(units, frames, summary);

        for page in &pages {
            if let Err(e) = sink.write_page(page).await {
                sink.abort().await;
                return Err(e);
            }
        }

        match sink.finish().await {
            Ok(artifact) => {
                debug!(pages = pages.len(), artifact = %artifact.display(), "document assembled");
                Ok(AssembledDocument {
                    artifact,
                    page_count: pages.len(),
                })
            }
            Err(e) => {
                sink.abort().await;
                Err(e)
            }
        }
    }
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new(PAGE_WORD_CAPACITY)
    }
}

/// Single-file Markdown document with frames inlined as base64 JPEG.
pub struct MarkdownSink {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl MarkdownSink {
    pub async fn create(path: &Path, meta: &DocumentMeta) -> Result<Self, AssemblyError> {
        let mut partial_name = path.file_name().unwrap_or_default().to_os_string();
        partial_name.push(".partial");
        let partial = path.with_file_name(partial_name);

        let write_err = |source| AssemblyError::Write {
            path: partial.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let mut writer = BufWriter::new(File::create(&partial).await.map_err(write_err)?);
        writer
            .write_all(render_header(meta).as_bytes())
            .await
            .map_err(write_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            partial,
            writer: Some(writer),
        })
    }

    fn write_error(&self, source: std::io::Error) -> AssemblyError {
        AssemblyError::Write {
            path: self.partial.clone(),
            source,
        }
    }

    fn closed_error(&self) -> AssemblyError {
        self.write_error(std::io::Error::other("document sink already closed"))
    }
}

#[async_trait]
impl DocumentSink for MarkdownSink {
    async fn write_page(&mut self, page: &DocumentPage) -> Result<(), AssemblyError> {
        let frame_data = match &page.frame {
            Some(frame) => {
                let bytes = fs::read(&frame.path)
                    .await
                    .map_err(|source| AssemblyError::FrameRead {
                        path: frame.path.clone(),
                        source,
                    })?;
                Some(STANDARD.encode(bytes))
            }
            None => None,
        };

        let rendered = render_page(page, frame_data.as_deref());
        let result = match self.writer.as_mut() {
            Some(writer) => writer.write_all(rendered.as_bytes()).await,
            None => return Err(self.closed_error()),
        };
        result.map_err(|e| self.write_error(e))
    }

    async fn finish(&mut self) -> Result<PathBuf, AssemblyError> {
        let Some(mut writer) = self.writer.take() else {
            return Err(self.closed_error());
        };
        writer.flush().await.map_err(|e| self.write_error(e))?;
        writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| self.write_error(e))?;
        drop(writer);

        fs::rename(&self.partial, &self.path)
            .await
            .map_err(|source| AssemblyError::Write {
                path: self.path.clone(),
                source,
            })?;
        Ok(self.path.clone())
    }

    async fn abort(&mut self) {
        self.writer.take();
        if let Err(e) = fs::remove_file(&self.partial).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove partial document {}: {}", self.partial.display(), e);
        }
    }
}
