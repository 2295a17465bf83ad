use async_trait::async_trait;
use media_uploader::pipeline::MediaUploader;
use media_uploader::session::{ActionKind, CaptureFacility, CaptureOutcome, CaptureRequest};
use media_uploader::staging::Category;
use media_uploader::upload::store::LocalObjectStore;
use media_uploader::utils::{guess_category, list_media_files};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Stand-in for the platform gallery picker: hands out files from a scanned
/// folder, one per launched request.
struct FolderPickFacility {
    files: Mutex<VecDeque<PathBuf>>,
}

#[async_trait]
impl CaptureFacility for FolderPickFacility {
    async fn launch(&self, _request: CaptureRequest) -> CaptureOutcome {
        match self.files.lock().await.pop_front() {
            Some(path) => CaptureOutcome::Completed(path),
            None => CaptureOutcome::Cancelled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let source = std::env::args().nth(1).unwrap_or_else(|| "assets".to_string());
    let mut picks = Vec::new();
    for file in list_media_files(Path::new(&source))? {
        let kind = match guess_category(&file) {
            Some(Category::Image) => ActionKind::PickImage,
            Some(Category::Video) => ActionKind::PickVideo,
            _ => continue,
        };
        picks.push((file, kind));
    }
    println!("Picking {} media files from {source}.", picks.len());

    let facility = Arc::new(FolderPickFacility {
        files: Mutex::new(picks.iter().map(|(file, _)| file.clone()).collect()),
    });
    let mut uploader = MediaUploader::builder()
        .staging_root(PathBuf::from("staging"))
        .store(Arc::new(LocalObjectStore::new("remote")))
        .capture(facility)
        .build();

    let handle = uploader.handle();
    let mut notifications = uploader
        .take_notifications()
        .ok_or("notifications already taken")?;
    let mut city = uploader.city_handle();
    let loop_task = tokio::spawn(uploader.run());

    handle.start_tracking()?;
    // Sydney CBD; a real host forwards fixes from the platform location
    // provider instead.
    handle.report_fix(-33.8688, 151.2093)?;
    city.changed().await;
    println!("Resolved city: {:?}", city.current_city());

    for (_, kind) in &picks {
        handle.capture(*kind)?;
        if let Some(report) = notifications.recv().await {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    handle.shutdown()?;
    loop_task.await?;
    Ok(())
}
