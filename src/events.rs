//! The single sequential event queue and the outbound notification stream.

use crate::location::geocode::{GeocodeError, Place};
use crate::session::{ActionId, ActionKind, CaptureOutcome};
use crate::upload::store::UploadError;
use crate::upload::{JobId, JobState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything the pipeline reacts to.
///
/// Location fixes, capture callbacks and upload completions all funnel onto
/// one queue and are processed in arrival order, so shared state never sees
/// two callbacks at once. Suspending operations (geocode lookup, capture
/// round-trip, transfer) complete by posting their follow-up event here.
#[derive(Debug)]
pub enum Event {
    StartTracking,
    StopTracking,
    LocationFix { latitude: f64, longitude: f64 },
    GeocodeResolved { seq: u64, result: Result<Place, GeocodeError> },
    Capture { kind: ActionKind },
    CaptureFinished { action: ActionId, outcome: CaptureOutcome },
    RetryUpload { job: JobId },
    UploadFinished { job: JobId, result: Result<(), UploadError> },
    Shutdown,
}

/// Why a pending action never produced an upload job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    Cancelled,
    PermissionDenied(String),
    StagingFailed(String),
}

/// Outbound reports for the hosting UI: exactly one per terminal upload
/// transition and one per aborted action.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Notification {
    UploadFinished {
        job: JobId,
        state: JobState,
        error: Option<UploadError>,
    },
    ActionAborted {
        action: ActionId,
        reason: AbortReason,
    },
}

/// The event loop has shut down and can no longer accept events.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("uploader event loop has shut down")]
pub struct Closed;
