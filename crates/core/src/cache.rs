//! Fixed artifact names inside a run's working directory.
//!
//! The names are not content-addressed: two runs sharing a working directory
//! see each other's artifacts, so at most one run may use a directory at a time.

use std::path::{Path, PathBuf};

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("vidpages")
}

pub fn get_default_work_dir() -> PathBuf {
    get_root_cache_dir().join("work")
}

pub fn get_model_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("models")
}

/// Find a downloaded video in the working directory
pub fn find_video_in_cache(work_dir: &Path) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(work_dir) else {
        return None;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_video_stem = path.file_stem().is_some_and(|stem| stem == "video");
        if !is_video_stem || !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if matches!(ext.as_str(), "mp4" | "webm" | "mkv" | "mov" | "avi") {
                return Some(path);
            }
        }
    }
    None
}

pub fn get_video_template(work_dir: &Path) -> PathBuf {
    work_dir.join("video.%(ext)s")
}

pub fn get_audio_path(work_dir: &Path) -> PathBuf {
    work_dir.join("audio.wav")
}

pub fn get_frames_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("frames")
}

pub fn get_frame_path(work_dir: &Path, index: usize) -> PathBuf {
    get_frames_dir(work_dir).join(format!("frame_{:05}.jpg", index))
}

pub fn get_segments_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("segments")
}

pub fn get_segment_path(work_dir: &Path, index: usize) -> PathBuf {
    get_segments_dir(work_dir).join(format!("segment_{:05}.wav", index))
}
