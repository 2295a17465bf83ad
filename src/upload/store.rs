use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Classified upload failure. Transient failures may be retried by the
/// caller; permanent ones terminate the job.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadError {
    #[error("transient upload failure: {0}")]
    Transient(String),

    #[error("permanent upload failure: {0}")]
    Permanent(String),
}

impl UploadError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Transient(_))
    }
}

/// External object store facility. `destination` is a provider key such as
/// `Sydney/images/IMG_20240501_123045.jpg`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, local_path: &Path, destination: &str) -> Result<(), UploadError>;
}

/// Filesystem-backed store that mirrors object keys as paths under a root.
///
/// Serves the demo binary and doubles as a stand-in while wiring a real
/// provider behind [`ObjectStore`].
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, local_path: &Path, destination: &str) -> Result<(), UploadError> {
        let target = self.root.join(destination);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(classify)?;
        }
        tokio::fs::copy(local_path, &target).await.map_err(classify)?;
        Ok(())
    }
}

fn classify(err: io::Error) -> UploadError {
    match err.kind() {
        // A missing or unreadable asset will not heal on retry.
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            UploadError::Permanent(err.to_string())
        }
        _ => UploadError::Transient(err.to_string()),
    }
}
