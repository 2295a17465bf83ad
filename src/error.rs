use thiserror::Error;

/// The primary error type for the media-uploader crate.
#[derive(Error, Debug)]
pub enum MediaUploaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Module Errors ---
    #[error("staging failed: {0}")]
    Staging(#[from] crate::staging::StagingError),

    #[error("geocode lookup failed: {0}")]
    Geocode(#[from] crate::location::geocode::GeocodeError),

    #[error("upload failed: {0}")]
    Upload(#[from] crate::upload::store::UploadError),

    #[error("upload job rejected: {0}")]
    Job(#[from] crate::upload::JobError),

    // --- Pipeline Lifecycle ---
    #[error(transparent)]
    Closed(#[from] crate::events::Closed),
}
