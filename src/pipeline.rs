//! The single logical actor that joins location, capture and upload streams.

use crate::events::{Closed, Event, Notification};
use crate::location::geocode::{CityGeocoder, Geocoder};
use crate::location::{CityHandle, LocationTracker};
use crate::session::{ActionKind, CaptureFacility, CaptureSessionManager};
use crate::staging::MediaStager;
use crate::upload::store::ObjectStore;
use crate::upload::{JobId, UploadAttempt, UploadCoordinator};
use bon::bon;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Owns all four components and processes their events from one sequential
/// queue, so no two callbacks ever touch shared state concurrently.
///
/// Use the builder to construct an instance, take the [`Notification`]
/// receiver and a handle, then hand the uploader to [`MediaUploader::run`]:
/// ```rust,no_run
/// # use std::path::PathBuf;
/// # use std::sync::Arc;
/// # use async_trait::async_trait;
/// # use media_uploader::pipeline::MediaUploader;
/// # use media_uploader::session::{ActionKind, CaptureFacility, CaptureOutcome, CaptureRequest};
/// # use media_uploader::upload::store::LocalObjectStore;
/// # struct GalleryPick;
/// # #[async_trait]
/// # impl CaptureFacility for GalleryPick {
/// #     async fn launch(&self, _request: CaptureRequest) -> CaptureOutcome {
/// #         CaptureOutcome::Completed(PathBuf::from("picked.jpg"))
/// #     }
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let mut uploader = MediaUploader::builder()
///     .staging_root(PathBuf::from("staging"))
///     .store(Arc::new(LocalObjectStore::new("remote")))
///     .capture(Arc::new(GalleryPick))
///     .build();
///
/// let handle = uploader.handle();
/// let mut notifications = uploader.take_notifications().unwrap();
/// tokio::spawn(uploader.run());
///
/// handle.start_tracking().unwrap();
/// handle.report_fix(-33.8688, 151.2093).unwrap();
/// handle.capture(ActionKind::PickImage).unwrap();
///
/// if let Some(report) = notifications.recv().await {
///     println!("{report:?}");
/// }
/// # }
/// ```
pub struct MediaUploader {
    tracker: LocationTracker,
    stager: MediaStager,
    session: CaptureSessionManager,
    uploader: UploadCoordinator,
    geocoder: Arc<dyn Geocoder>,
    capture: Arc<dyn CaptureFacility>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    notifications: Option<mpsc::UnboundedReceiver<Notification>>,
}

#[bon]
impl MediaUploader {
    /// Constructs a `MediaUploader` via a builder pattern.
    ///
    /// # Builder Arguments
    ///
    /// * `staging_root: PathBuf` - Directory the stager creates category
    ///   folders under.
    /// * `store: Arc<dyn ObjectStore>` - Remote object store uploads go to.
    /// * `capture: Arc<dyn CaptureFacility>` - Platform capture/pick facility.
    /// * `geocoder: Option<Arc<dyn Geocoder>>` - Reverse geocoder. Defaults
    ///   to the offline [`CityGeocoder`].
    #[builder]
    pub fn new(
        staging_root: PathBuf,
        store: Arc<dyn ObjectStore>,
        capture: Arc<dyn CaptureFacility>,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> Self {
        let geocoder = geocoder.unwrap_or_else(|| Arc::new(CityGeocoder::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let tracker = LocationTracker::new();
        let uploader = UploadCoordinator::new(tracker.city_handle(), store, notify_tx.clone());
        Self {
            tracker,
            stager: MediaStager::new(staging_root),
            session: CaptureSessionManager::new(notify_tx),
            uploader,
            geocoder,
            capture,
            events_tx,
            events_rx,
            notifications: Some(notify_rx),
        }
    }

    /// Cloneable handle for injecting events into the queue.
    pub fn handle(&self) -> UploaderHandle {
        UploaderHandle {
            events: self.events_tx.clone(),
        }
    }

    /// The outbound notification stream. Yields `Some` once.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.notifications.take()
    }

    /// Non-blocking view of the tracker's snapshot.
    pub fn city_handle(&self) -> CityHandle {
        self.tracker.city_handle()
    }

    /// Drains the queue until a shutdown event arrives.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            if matches!(event, Event::Shutdown) {
                debug!("shutting down");
                break;
            }
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::StartTracking => self.tracker.start(),
            Event::StopTracking => self.tracker.stop(),
            Event::LocationFix { latitude, longitude } => {
                if let Some(seq) = self.tracker.record_fix(latitude, longitude) {
                    let geocoder = Arc::clone(&self.geocoder);
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        let result = geocoder.lookup(latitude, longitude).await;
                        let _ = events.send(Event::GeocodeResolved { seq, result });
                    });
                }
            }
            Event::GeocodeResolved { seq, result } => {
                self.tracker.apply_geocode(seq, result);
            }
            Event::Capture { kind } => {
                match self.session.begin(kind, &self.stager, Utc::now()) {
                    Ok(request) => {
                        let facility = Arc::clone(&self.capture);
                        let events = self.events_tx.clone();
                        let action = request.action;
                        tokio::spawn(async move {
                            let outcome = facility.launch(request).await;
                            let _ = events.send(Event::CaptureFinished { action, outcome });
                        });
                    }
                    // Already reported by the session manager.
                    Err(err) => debug!(?kind, %err, "capture not launched"),
                }
            }
            Event::CaptureFinished { action, outcome } => {
                if let Some(job) =
                    self.session
                        .finish(action, outcome, &self.stager, &mut self.uploader)
                {
                    match self.uploader.begin_attempt(job.id) {
                        Ok(attempt) => self.spawn_transfer(attempt),
                        Err(err) => warn!(job = %job.id, %err, "could not start upload attempt"),
                    }
                }
            }
            Event::RetryUpload { job } => match self.uploader.retry(job) {
                Ok(attempt) => self.spawn_transfer(attempt),
                Err(err) => warn!(%job, %err, "retry rejected"),
            },
            Event::UploadFinished { job, result } => {
                if let Err(err) = self.uploader.complete(job, result) {
                    warn!(%job, %err, "dropping upload completion");
                }
            }
            // Handled by the run loop.
            Event::Shutdown => {}
        }
    }

    fn spawn_transfer(&self, attempt: UploadAttempt) {
        let store = self.uploader.store();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = store.put(&attempt.local_path, &attempt.destination).await;
            let _ = events.send(Event::UploadFinished {
                job: attempt.job,
                result,
            });
        });
    }
}

/// Fire-and-forget event injection into a running [`MediaUploader`].
#[derive(Clone)]
pub struct UploaderHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl UploaderHandle {
    pub fn start_tracking(&self) -> Result<(), Closed> {
        self.send(Event::StartTracking)
    }

    pub fn stop_tracking(&self) -> Result<(), Closed> {
        self.send(Event::StopTracking)
    }

    /// Forwards a raw location-provider fix.
    pub fn report_fix(&self, latitude: f64, longitude: f64) -> Result<(), Closed> {
        self.send(Event::LocationFix {
            latitude,
            longitude,
        })
    }

    /// Triggers a capture or pick action.
    pub fn capture(&self, kind: ActionKind) -> Result<(), Closed> {
        self.send(Event::Capture { kind })
    }

    /// Re-runs a failed upload job. Rejections (wrong state, permanent
    /// failure) are logged by the pipeline.
    pub fn retry(&self, job: JobId) -> Result<(), Closed> {
        self.send(Event::RetryUpload { job })
    }

    pub fn shutdown(&self) -> Result<(), Closed> {
        self.send(Event::Shutdown)
    }

    fn send(&self, event: Event) -> Result<(), Closed> {
        self.events.send(event).map_err(|_| Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AbortReason;
    use crate::location::geocode::{GeocodeError, Place};
    use crate::session::{CaptureOutcome, CaptureRequest};
    use crate::upload::JobState;
    use crate::upload::store::{LocalObjectStore, UploadError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::timeout;

    struct FixedCity(&'static str);

    #[async_trait]
    impl Geocoder for FixedCity {
        async fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Place, GeocodeError> {
            Ok(Place {
                city: self.0.to_string(),
                country_code: "AU".to_string(),
                country_name: Some("Australia".to_string()),
            })
        }
    }

    /// Pick facility handing out a fixed file.
    struct PickFile(PathBuf);

    #[async_trait]
    impl CaptureFacility for PickFile {
        async fn launch(&self, _request: CaptureRequest) -> CaptureOutcome {
            CaptureOutcome::Completed(self.0.clone())
        }
    }

    /// Camera facility writing bytes into the requested target path.
    struct WriteToTarget;

    #[async_trait]
    impl CaptureFacility for WriteToTarget {
        async fn launch(&self, request: CaptureRequest) -> CaptureOutcome {
            let Some(target) = request.output_path else {
                return CaptureOutcome::Cancelled;
            };
            match std::fs::write(&target, b"pixels") {
                Ok(()) => CaptureOutcome::Completed(target),
                Err(err) => CaptureOutcome::Denied(err.to_string()),
            }
        }
    }

    struct AlwaysCancel;

    #[async_trait]
    impl CaptureFacility for AlwaysCancel {
        async fn launch(&self, _request: CaptureRequest) -> CaptureOutcome {
            CaptureOutcome::Cancelled
        }
    }

    /// Store that replays scripted results, then succeeds.
    struct ScriptedStore(Mutex<VecDeque<Result<(), UploadError>>>);

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn put(&self, _local_path: &Path, _destination: &str) -> Result<(), UploadError> {
            self.0.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    async fn wait_for_city(mut city: CityHandle) -> Option<String> {
        timeout(Duration::from_secs(5), async {
            while city.current_city().is_none() {
                assert!(city.changed().await, "tracker went away");
            }
            city.current_city()
        })
        .await
        .expect("city never resolved")
    }

    async fn next_notification(
        notifications: &mut mpsc::UnboundedReceiver<Notification>,
    ) -> Notification {
        timeout(Duration::from_secs(5), notifications.recv())
            .await
            .expect("no notification arrived")
            .expect("notification stream closed")
    }

    #[tokio::test]
    async fn picked_image_lands_under_the_resolved_city() {
        let staging = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let picked = staging.path().join("picked.jpg");
        std::fs::write(&picked, b"pixels").unwrap();

        let mut uploader = MediaUploader::builder()
            .staging_root(staging.path().to_path_buf())
            .store(Arc::new(LocalObjectStore::new(remote.path())))
            .capture(Arc::new(PickFile(picked)))
            .geocoder(Arc::new(FixedCity("Sydney")))
            .build();
        let handle = uploader.handle();
        let mut notifications = uploader.take_notifications().unwrap();
        let city = uploader.city_handle();
        let loop_task = tokio::spawn(uploader.run());

        handle.start_tracking().unwrap();
        handle.report_fix(-33.8688, 151.2093).unwrap();
        assert_eq!(wait_for_city(city).await, Some("Sydney".to_string()));

        handle.capture(ActionKind::PickImage).unwrap();
        let note = next_notification(&mut notifications).await;
        assert!(matches!(
            note,
            Notification::UploadFinished {
                state: JobState::Succeeded,
                error: None,
                ..
            }
        ));
        assert!(remote.path().join("Sydney/images/picked.jpg").is_file());

        handle.shutdown().unwrap();
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn capture_without_a_city_lands_under_unknown() {
        let staging = tempdir().unwrap();
        let remote = tempdir().unwrap();

        let mut uploader = MediaUploader::builder()
            .staging_root(staging.path().to_path_buf())
            .store(Arc::new(LocalObjectStore::new(remote.path())))
            .capture(Arc::new(WriteToTarget))
            .geocoder(Arc::new(FixedCity("Sydney")))
            .build();
        let handle = uploader.handle();
        let mut notifications = uploader.take_notifications().unwrap();
        let loop_task = tokio::spawn(uploader.run());

        // No fix was ever reported; the city label falls back to "unknown".
        handle.capture(ActionKind::Photo).unwrap();
        let note = next_notification(&mut notifications).await;
        assert!(matches!(
            note,
            Notification::UploadFinished {
                state: JobState::Succeeded,
                ..
            }
        ));

        let uploaded: Vec<_> = std::fs::read_dir(remote.path().join("unknown/images"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(uploaded.len(), 1);
        assert!(uploaded[0].starts_with("IMG_") && uploaded[0].ends_with(".jpg"));

        handle.shutdown().unwrap();
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_pick_reports_an_abort_and_no_job() {
        let staging = tempdir().unwrap();
        let remote = tempdir().unwrap();

        let mut uploader = MediaUploader::builder()
            .staging_root(staging.path().to_path_buf())
            .store(Arc::new(LocalObjectStore::new(remote.path())))
            .capture(Arc::new(AlwaysCancel))
            .geocoder(Arc::new(FixedCity("Sydney")))
            .build();
        let handle = uploader.handle();
        let mut notifications = uploader.take_notifications().unwrap();
        let loop_task = tokio::spawn(uploader.run());

        handle.capture(ActionKind::PickVideo).unwrap();
        let note = next_notification(&mut notifications).await;
        assert!(matches!(
            note,
            Notification::ActionAborted {
                reason: AbortReason::Cancelled,
                ..
            }
        ));

        handle.shutdown().unwrap();
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn transient_failure_is_retried_through_the_handle() {
        let staging = tempdir().unwrap();
        let picked = staging.path().join("picked.jpg");
        std::fs::write(&picked, b"pixels").unwrap();

        let store = ScriptedStore(Mutex::new(VecDeque::from([Err(UploadError::Transient(
            "503 from service".to_string(),
        ))])));
        let mut uploader = MediaUploader::builder()
            .staging_root(staging.path().to_path_buf())
            .store(Arc::new(store))
            .capture(Arc::new(PickFile(picked)))
            .geocoder(Arc::new(FixedCity("Sydney")))
            .build();
        let handle = uploader.handle();
        let mut notifications = uploader.take_notifications().unwrap();
        let loop_task = tokio::spawn(uploader.run());

        handle.capture(ActionKind::PickImage).unwrap();
        let Notification::UploadFinished { job, state, error } =
            next_notification(&mut notifications).await
        else {
            panic!("expected an upload notification");
        };
        assert_eq!(state, JobState::Failed);
        assert!(matches!(error, Some(UploadError::Transient(_))));

        handle.retry(job).unwrap();
        let note = next_notification(&mut notifications).await;
        assert!(matches!(
            note,
            Notification::UploadFinished {
                state: JobState::Succeeded,
                error: None,
                ..
            }
        ));

        handle.shutdown().unwrap();
        loop_task.await.unwrap();
    }
}
