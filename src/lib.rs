//! # Media Uploader
//!
//! Capture or pick photo/video assets, tag them with the city the device was
//! last seen in, stage them locally and upload them to remote object storage
//! under a `{city}/{category}/{file}` path.
//!
//! The heart of the crate is the coordination of three independent
//! asynchronous streams — location fixes, user-triggered capture/pick
//! callbacks and upload completions — onto one sequential event queue. An
//! upload uses the *best available* city label at the moment its asset
//! becomes ready; location updates arrive on their own schedule and may never
//! arrive at all, in which case the asset lands under `unknown`.
//!
//! ## Key Pieces
//!
//! - **[`location::LocationTracker`]**: turns raw provider fixes into a
//!   last-known-good city reading, guarded against out-of-order geocode
//!   completions.
//! - **[`staging::MediaStager`]**: resolves staging paths per media category
//!   and wraps staged files into immutable asset handles.
//! - **[`upload::UploadCoordinator`]**: freezes each job's destination at
//!   submit time and walks it through `Queued → InFlight → {Succeeded |
//!   Failed}` with caller-driven retry.
//! - **[`session::CaptureSessionManager`]**: correlates capture/pick
//!   round-trips back to their pending actions.
//! - **[`pipeline::MediaUploader`]**: the single logical actor that owns all
//!   of the above and drains the event queue.
//!
//! The platform camera/picker, the geocoding service and the object store are
//! trait seams ([`session::CaptureFacility`], [`location::geocode::Geocoder`],
//! [`upload::store::ObjectStore`]); hosts plug their own implementations in.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use media_uploader::pipeline::MediaUploader;
//! use media_uploader::session::{ActionKind, CaptureFacility, CaptureOutcome, CaptureRequest};
//! use media_uploader::upload::store::LocalObjectStore;
//!
//! struct GalleryPick;
//!
//! #[async_trait]
//! impl CaptureFacility for GalleryPick {
//!     async fn launch(&self, _request: CaptureRequest) -> CaptureOutcome {
//!         CaptureOutcome::Completed(PathBuf::from("picked.jpg"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut uploader = MediaUploader::builder()
//!         .staging_root(PathBuf::from("staging"))
//!         .store(Arc::new(LocalObjectStore::new("remote")))
//!         .capture(Arc::new(GalleryPick))
//!         .build();
//!
//!     let handle = uploader.handle();
//!     let mut notifications = uploader.take_notifications().unwrap();
//!     tokio::spawn(uploader.run());
//!
//!     handle.start_tracking().unwrap();
//!     handle.report_fix(-33.8688, 151.2093).unwrap();
//!     handle.capture(ActionKind::PickImage).unwrap();
//!
//!     if let Some(report) = notifications.recv().await {
//!         println!("Upload report: {report:?}");
//!     }
//! }
//! ```

pub mod error;
pub mod events;
pub mod location;
pub mod pipeline;
pub mod session;
pub mod staging;
pub mod upload;
pub mod utils;

pub use error::MediaUploaderError;
pub use pipeline::{MediaUploader, UploaderHandle};
