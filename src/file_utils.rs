use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use walkdir::WalkDir;

// @module: File and output-path utilities

// @const: Video containers the pipeline accepts
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "webm", "m4v"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Base path of a video (full path without the extension)
    fn base_path(video_path: &Path) -> PathBuf {
        video_path.with_extension("")
    }

    // @generates: Per-language subtitle path: {base}_{lang}.srt
    pub fn subtitle_path<P: AsRef<Path>>(video_path: P, language: &str) -> PathBuf {
        let base = Self::base_path(video_path.as_ref());
        PathBuf::from(format!("{}_{}.srt", base.display(), language))
    }

    // @generates: Styled track path: {base}_{l1}.ass or {base}_{l1}_{l2}.ass
    pub fn styled_track_path<P: AsRef<Path>>(video_path: P, languages: &[String]) -> PathBuf {
        let base = Self::base_path(video_path.as_ref());
        PathBuf::from(format!("{}_{}.ass", base.display(), languages.join("_")))
    }

    // @generates: Burned-in output path: {base}_{langs}_subtitled.mp4
    pub fn subtitled_output_path<P: AsRef<Path>>(video_path: P, languages: &[String]) -> PathBuf {
        let base = Self::base_path(video_path.as_ref());
        PathBuf::from(format!("{}_{}_subtitled.mp4", base.display(), languages.join("_")))
    }

    /// Find video files under a directory, recursively
    pub fn find_video_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }
}
