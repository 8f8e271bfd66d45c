//! Single file download jobs.

use crate::catalog::CatalogClient;
use crate::error::SyncError;
use crate::mirror::MirrorStore;
use crate::types::DownloadJob;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};

/// Completion counters shared by every worker of one run.
///
/// `completed` and `failed` move together under one lock, so every snapshot
/// handed out is a consistent pair.
#[derive(Debug)]
pub struct DownloadTally {
    total: usize,
    counts: Mutex<TallyCounts>,
}

#[derive(Debug, Default, Clone, Copy)]
struct TallyCounts {
    completed: usize,
    failed: usize,
}

impl DownloadTally {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            counts: Mutex::new(TallyCounts::default()),
        }
    }

    fn counts(&self) -> std::sync::MutexGuard<'_, TallyCounts> {
        // Counters stay valid even if a holder panicked.
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records one finished job and returns `(completed, failed)` including it.
    pub fn record(&self, success: bool) -> (usize, usize) {
        let mut counts = self.counts();
        counts.completed += 1;
        if !success {
            counts.failed += 1;
        }
        (counts.completed, counts.failed)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.counts().completed
    }

    pub fn failed(&self) -> usize {
        self.counts().failed
    }

    pub fn succeeded(&self) -> usize {
        let counts = *self.counts();
        counts.completed - counts.failed
    }
}

/// Fetches one remote file and writes it into the mirror.
///
/// The content is fully fetched before anything touches the filesystem, so a
/// failed request leaves any existing local copy untouched.
pub(crate) async fn download_job(
    catalog: &CatalogClient,
    mirror: &MirrorStore,
    job: &DownloadJob,
) -> Result<PathBuf, SyncError> {
    // Resolve the destination up front so unsafe names fail without a request.
    let local_path =
        mirror.content_path(&job.stage_name, &job.testcase_name, &job.remote_file_path)?;
    info!("Downloading {}", local_path.display());

    let content = catalog
        .fetch_file_content(&job.stage_name, &job.remote_file_path)
        .await?;
    mirror
        .save_file_content(&content, &job.stage_name, &job.testcase_name, &job.remote_file_path)
        .await
}

/// Runs one job and records its outcome; returns whether it succeeded.
pub(crate) async fn run_job(
    catalog: &CatalogClient,
    mirror: &MirrorStore,
    job: &DownloadJob,
    tally: &DownloadTally,
) -> bool {
    let success = match download_job(catalog, mirror, job).await {
        Ok(_) => true,
        Err(e) => {
            error!(
                "Failed to download {} of {}/{}: {}",
                job.path_key, job.stage_name, job.testcase_name, e
            );
            false
        }
    };

    let (completed, failed) = tally.record(success);
    if completed % 10 == 0 || completed == tally.total() {
        info!(
            "Progress: {}/{} completed, {} failed",
            completed,
            tally.total(),
            failed
        );
    }
    success
}
