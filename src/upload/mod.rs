//! Upload jobs and the coordinator that drives them.
//!
//! A job's destination is computed once, at submit time, from the best city
//! known at that moment. It is never re-evaluated: a late-arriving city must
//! not retroactively change where an already-queued asset lands, and a retry
//! reuses the original destination.

pub mod store;

use crate::events::Notification;
use crate::location::CityHandle;
use crate::staging::AssetHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use self::store::{ObjectStore, UploadError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

pub type JobId = Uuid;

const UNKNOWN_CITY: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Queued,
    InFlight,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// One asset's transfer to remote storage, through its state machine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    pub id: JobId,
    pub asset: AssetHandle,
    pub destination_path: String,
    pub state: JobState,
    pub attempt: u32,
    pub last_error: Option<UploadError>,
}

/// Transfer parameters for one attempt, handed to whoever performs the
/// actual object-store call.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadAttempt {
    pub job: JobId,
    pub local_path: PathBuf,
    pub destination: String,
    pub attempt: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("unknown upload job {0}")]
    UnknownJob(JobId),

    #[error("invalid transition from the {0:?} state")]
    InvalidTransition(JobState),

    #[error("job failed permanently and cannot be retried")]
    NotRetryable,
}

/// Owns every [`UploadJob`] and is the only component that mutates job state.
pub struct UploadCoordinator {
    jobs: HashMap<JobId, UploadJob>,
    city: CityHandle,
    store: Arc<dyn ObjectStore>,
    notify: mpsc::UnboundedSender<Notification>,
}

impl UploadCoordinator {
    pub fn new(
        city: CityHandle,
        store: Arc<dyn ObjectStore>,
        notify: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self {
            jobs: HashMap::new(),
            city,
            store,
            notify,
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Creates a `Queued` job for the asset, freezing the destination path
    /// from the city known right now (or `unknown` when none has resolved).
    pub fn submit(&mut self, asset: AssetHandle) -> UploadJob {
        let city = self
            .city
            .current_city()
            .unwrap_or_else(|| UNKNOWN_CITY.to_string());
        let destination_path = format!("{}/{}/{}", city, asset.category.folder(), asset.file_name);
        let job = UploadJob {
            id: Uuid::new_v4(),
            asset,
            destination_path,
            state: JobState::Queued,
            attempt: 0,
            last_error: None,
        };
        info!(job = %job.id, destination = %job.destination_path, "upload job queued");
        self.jobs.insert(job.id, job.clone());
        job
    }

    /// Moves a `Queued` job into `InFlight` and returns the transfer
    /// parameters for its first attempt.
    pub fn begin_attempt(&mut self, id: JobId) -> Result<UploadAttempt, JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::UnknownJob(id))?;
        if job.state != JobState::Queued {
            return Err(JobError::InvalidTransition(job.state));
        }
        job.state = JobState::InFlight;
        job.attempt += 1;
        Ok(UploadAttempt {
            job: id,
            local_path: job.asset.local_uri.clone(),
            destination: job.destination_path.clone(),
            attempt: job.attempt,
        })
    }

    /// Re-runs a `Failed` job. Only transient failures are retryable; the
    /// original destination path is reused as-is.
    pub fn retry(&mut self, id: JobId) -> Result<UploadAttempt, JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::UnknownJob(id))?;
        if job.state != JobState::Failed {
            return Err(JobError::InvalidTransition(job.state));
        }
        if matches!(job.last_error, Some(UploadError::Permanent(_))) {
            return Err(JobError::NotRetryable);
        }
        job.state = JobState::InFlight;
        job.attempt += 1;
        info!(job = %id, attempt = job.attempt, destination = %job.destination_path, "retrying upload");
        Ok(UploadAttempt {
            job: id,
            local_path: job.asset.local_uri.clone(),
            destination: job.destination_path.clone(),
            attempt: job.attempt,
        })
    }

    /// Records the terminal result of an attempt and emits the terminal
    /// notification for it — exactly one per terminal transition.
    pub fn complete(&mut self, id: JobId, result: Result<(), UploadError>) -> Result<JobState, JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::UnknownJob(id))?;
        if job.state != JobState::InFlight {
            return Err(JobError::InvalidTransition(job.state));
        }
        match result {
            Ok(()) => {
                job.state = JobState::Succeeded;
                job.last_error = None;
                info!(job = %id, destination = %job.destination_path, "upload succeeded");
            }
            Err(err) => {
                job.state = JobState::Failed;
                warn!(job = %id, attempt = job.attempt, %err, "upload failed");
                job.last_error = Some(err);
            }
        }
        let _ = self.notify.send(Notification::UploadFinished {
            job: id,
            state: job.state,
            error: job.last_error.clone(),
        });
        Ok(job.state)
    }

    pub fn job(&self, id: JobId) -> Option<&UploadJob> {
        self.jobs.get(&id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}
