//! User-facing capture and pick actions, correlated with their platform
//! callbacks.
//!
//! Each trigger creates a [`PendingAction`] that walks
//! `Created → AwaitingPlatformResult → {Resolved | Cancelled}`. A resolved
//! action is staged and submitted for upload; an aborted one reports exactly
//! once and never reaches the stager or the coordinator. Callbacks with an
//! unrecognized correlation id are ignored, not treated as fatal.

use crate::events::{AbortReason, Notification};
use crate::staging::{Category, MediaStager, StagingError};
use crate::upload::{UploadCoordinator, UploadJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub type ActionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Photo,
    Video,
    PickImage,
    PickVideo,
}

impl ActionKind {
    pub fn category(self) -> Category {
        match self {
            ActionKind::Photo | ActionKind::PickImage => Category::Image,
            ActionKind::Video | ActionKind::PickVideo => Category::Video,
        }
    }

    /// Captures write into a pre-resolved staging path; gallery picks return
    /// wherever the platform already stored the media.
    pub fn needs_target(self) -> bool {
        matches!(self, ActionKind::Photo | ActionKind::Video)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionState {
    Created,
    AwaitingPlatformResult,
    Resolved,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub target_path: Option<PathBuf>,
    pub state: ActionState,
}

/// Request handed to the platform capture/pick facility.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub action: ActionId,
    pub kind: ActionKind,
    pub output_path: Option<PathBuf>,
}

/// What the platform reported back for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Bytes exist at the returned local URI.
    Completed(PathBuf),
    /// The user aborted, or the platform failed the round-trip.
    Cancelled,
    /// The platform refused the feature outright.
    Denied(String),
}

/// External capture/pick facility (camera, gallery picker). Opaque to the
/// core; it resolves every launched request with exactly one outcome.
#[async_trait]
pub trait CaptureFacility: Send + Sync {
    async fn launch(&self, request: CaptureRequest) -> CaptureOutcome;
}

/// Owns the set of in-flight [`PendingAction`]s, keyed by correlation id.
pub struct CaptureSessionManager {
    pending: HashMap<ActionId, PendingAction>,
    notify: mpsc::UnboundedSender<Notification>,
}

impl CaptureSessionManager {
    pub fn new(notify: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            pending: HashMap::new(),
            notify,
        }
    }

    /// Creates a [`PendingAction`] for a user trigger and returns the
    /// platform request for it. For captures the output path is resolved (and
    /// its directory created) up front; a staging failure aborts the action
    /// with a single report and no request is produced.
    pub fn begin(
        &mut self,
        kind: ActionKind,
        stager: &MediaStager,
        at: DateTime<Utc>,
    ) -> Result<CaptureRequest, StagingError> {
        let id = Uuid::new_v4();
        let mut action = PendingAction {
            id,
            kind,
            target_path: None,
            state: ActionState::Created,
        };
        if kind.needs_target() {
            let file_name = MediaStager::capture_file_name(kind.category(), at);
            match stager.resolve_path(&file_name, kind.category()) {
                Ok(path) => action.target_path = Some(path),
                Err(err) => {
                    warn!(action = %id, ?kind, %err, "could not stage capture target");
                    let _ = self.notify.send(Notification::ActionAborted {
                        action: id,
                        reason: AbortReason::StagingFailed(err.to_string()),
                    });
                    return Err(err);
                }
            }
        }
        action.state = ActionState::AwaitingPlatformResult;
        debug!(action = %id, ?kind, "awaiting platform result");
        let request = CaptureRequest {
            action: id,
            kind,
            output_path: action.target_path.clone(),
        };
        self.pending.insert(id, action);
        Ok(request)
    }

    /// Applies the platform callback for an action.
    ///
    /// On success the asset is registered with the stager and submitted to
    /// the coordinator; the created job is returned. Aborts report once and
    /// return `None`. An unknown correlation id is logged and ignored.
    pub fn finish(
        &mut self,
        id: ActionId,
        outcome: CaptureOutcome,
        stager: &MediaStager,
        uploader: &mut UploadCoordinator,
    ) -> Option<UploadJob> {
        let Some(mut action) = self.pending.remove(&id) else {
            warn!(action = %id, "ignoring capture result with unknown correlation id");
            return None;
        };
        match outcome {
            CaptureOutcome::Completed(local_uri) => {
                let Some(file_name) = local_uri
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_owned)
                else {
                    return self.abort(
                        action,
                        AbortReason::StagingFailed(format!(
                            "result uri {} has no file name",
                            local_uri.display()
                        )),
                    );
                };
                match stager.register_asset(&local_uri, action.kind.category(), &file_name) {
                    Ok(asset) => {
                        action.state = ActionState::Resolved;
                        debug!(action = %id, uri = %local_uri.display(), "action resolved");
                        Some(uploader.submit(asset))
                    }
                    Err(err) => self.abort(action, AbortReason::StagingFailed(err.to_string())),
                }
            }
            CaptureOutcome::Cancelled => self.abort(action, AbortReason::Cancelled),
            CaptureOutcome::Denied(message) => {
                self.abort(action, AbortReason::PermissionDenied(message))
            }
        }
    }

    fn abort(&mut self, mut action: PendingAction, reason: AbortReason) -> Option<UploadJob> {
        action.state = ActionState::Cancelled;
        warn!(action = %action.id, kind = ?action.kind, ?reason, "action not completed");
        let _ = self.notify.send(Notification::ActionAborted {
            action: action.id,
            reason,
        });
        None
    }

    pub fn pending(&self, id: ActionId) -> Option<&PendingAction> {
        self.pending.get(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
