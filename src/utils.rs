use crate::staging::Category;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "flac", "ogg"];

/// Checks if a directory entry is hidden (starts with '.').
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Guesses the staging category from a file extension.
pub fn guess_category(path: &Path) -> Option<Category> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(Category::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Some(Category::Video)
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Some(Category::Audio)
    } else {
        None
    }
}

/// Recursively lists media files under a directory, skipping hidden entries.
/// I/O errors encountered during traversal propagate.
pub fn list_media_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry_result| match entry_result {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_file() && guess_category(path).is_some() {
                    Some(Ok(path.to_path_buf()))
                } else {
                    None
                }
            }
            Err(e) => Some(Err(e)),
        })
        .collect()
}
