//! Local staging of captured or picked media, ahead of upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("no file exists at {0}")]
    AssetNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Image,
    Video,
    Audio,
}

impl Category {
    /// Folder segment used in both staged and remote paths.
    pub fn folder(self) -> &'static str {
        match self {
            Category::Image => "images",
            Category::Video => "videos",
            Category::Audio => "audio",
        }
    }

    pub fn capture_prefix(self) -> &'static str {
        match self {
            Category::Image => "IMG_",
            Category::Video => "VIDEO_",
            Category::Audio => "AUDIO_",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Category::Image => "jpg",
            Category::Video => "mp4",
            Category::Audio => "m4a",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

/// Immutable reference to a staged local media file, ready for upload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHandle {
    pub local_uri: PathBuf,
    pub category: Category,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

/// Resolves staging paths under a media root and wraps staged files into
/// [`AssetHandle`]s.
pub struct MediaStager {
    root: PathBuf,
}

impl MediaStager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Builds the staging path for a file of the given category, creating the
    /// category directory when absent. Safe to call repeatedly.
    pub fn resolve_path(&self, file_name: &str, category: Category) -> Result<PathBuf, StagingError> {
        let dir = self.root.join(category.folder());
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        if path.exists() {
            debug!(path = %path.display(), "staged file already exists and will be overwritten");
        }
        Ok(path)
    }

    /// Derives a capture file name from the capture timestamp.
    ///
    /// Timestamps are truncated to whole seconds, so two captures within the
    /// same second share a name and the later one overwrites the earlier.
    /// Known limitation, carried over from the source behavior.
    pub fn capture_file_name(category: Category, at: DateTime<Utc>) -> String {
        format!(
            "{}{}.{}",
            category.capture_prefix(),
            at.format("%Y%m%d_%H%M%S"),
            category.extension()
        )
    }

    /// Wraps an existing file into an [`AssetHandle`].
    pub fn register_asset(
        &self,
        local_uri: &Path,
        category: Category,
        file_name: &str,
    ) -> Result<AssetHandle, StagingError> {
        if !local_uri.is_file() {
            return Err(StagingError::AssetNotFound(local_uri.to_path_buf()));
        }
        Ok(AssetHandle {
            local_uri: local_uri.to_path_buf(),
            category,
            file_name: file_name.to_string(),
            created_at: Utc::now(),
        })
    }
}
