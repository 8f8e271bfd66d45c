//! Main orchestration logic for mirroring the catalog.

use crate::catalog::CatalogClient;
use crate::detect::{detect_changes, NoOpReason, SyncDecision};
use crate::download::{run_job, DownloadTally};
use crate::error::SyncError;
use crate::mirror::{path_component, MirrorStore};
use crate::types::{DownloadJob, Stage, SyncConfig};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// What the change detector decided.
    pub decision: SyncDecision,
    /// Number of download jobs executed.
    pub total: usize,
    /// Number of those jobs that failed.
    pub failed: usize,
    /// Stages rejected by name or whose testcase listing could not be used.
    pub skipped_stages: Vec<String>,
    /// Testcases whose `testcase_info.json` could not be written.
    pub info_failures: usize,
}

impl SyncReport {
    fn nothing_to_do(decision: SyncDecision) -> Self {
        Self {
            decision,
            total: 0,
            failed: 0,
            skipped_stages: Vec::new(),
            info_failures: 0,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.total - self.failed
    }

    /// True when every selected stage and every job went through.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.skipped_stages.is_empty() && self.info_failures == 0
    }
}

/// Mirrors the catalog into `config.mirror_root`.
///
/// Steps:
///
/// 1. Fetches the stage listing (failure here is fatal)
/// 2. Compares it with the stored snapshot and persists the new one
/// 3. Lists testcases of each selected stage, writing their info records
/// 4. Downloads every referenced file with bounded concurrency
///
/// # Example
///
/// ```no_run
/// use stagesync::{sync_mirror, SyncConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = sync_mirror(&SyncConfig::default()).await?;
/// println!("{}/{} files", report.succeeded(), report.total);
/// # Ok(())
/// # }
/// ```
pub async fn sync_mirror(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let mirror = MirrorStore::new(&config.mirror_root);
    mirror.ensure_root()?;
    debug!("Mirroring into {}", mirror.root().display());
    let catalog = CatalogClient::new(config)?;

    info!("Retrieving stages from {}", catalog.stages_url());
    let current = catalog.list_stages().await?;

    let previous = if config.force_full_sync {
        info!("Full sync requested, ignoring stored snapshot");
        None
    } else {
        mirror.load_previous_snapshot()
    };
    let decision = detect_changes(previous.as_ref(), &current);

    // Written before any download starts; a crash mid-run keeps the new marker.
    if decision.persists_snapshot() {
        match mirror.save_previous_snapshot(&current) {
            Ok(()) => info!("Persisted stages metadata to {}", mirror.snapshot_path().display()),
            Err(e) => warn!("Failed to write metadata file: {}", e),
        }
    }

    if let SyncDecision::NoOp(reason) = decision {
        match reason {
            NoOpReason::HashUnchanged => {
                info!("No update detected (git hash unchanged). Skipping download.")
            }
            NoOpReason::NoStagesChanged => {
                info!("No stages changed since last run. Nothing to update.")
            }
        }
        return Ok(SyncReport::nothing_to_do(decision));
    }

    if let SyncDecision::PartialSync { stages } = &decision {
        info!("Updating {} stage(s): {}", stages.len(), stages.join(", "));
    } else {
        info!("Syncing all {} stage(s)", current.stages.len());
    }

    let plan = plan_downloads(&catalog, &mirror, decision.selected_stages(&current)).await;

    let total = plan.jobs.len();
    let failed = if plan.jobs.is_empty() {
        info!("No files to download");
        0
    } else {
        info!("Starting {} downloads...", total);
        let tally = execute_jobs(
            Arc::new(catalog),
            Arc::new(mirror),
            plan.jobs,
            config.max_concurrent_downloads,
        )
        .await;
        info!(
            "Download completed: {}/{} successful",
            tally.succeeded(),
            tally.completed()
        );
        tally.failed()
    };

    Ok(SyncReport {
        decision,
        total,
        failed,
        skipped_stages: plan.skipped_stages,
        info_failures: plan.info_failures,
    })
}

/// Jobs collected from the selected stages.
#[derive(Debug, Default)]
struct DownloadPlan {
    jobs: Vec<DownloadJob>,
    skipped_stages: Vec<String>,
    info_failures: usize,
}

/// Lists testcases stage by stage, saving info records as it goes.
async fn plan_downloads(
    catalog: &CatalogClient,
    mirror: &MirrorStore,
    stages: Vec<&Stage>,
) -> DownloadPlan {
    let mut plan = DownloadPlan::default();

    for stage in stages {
        let stage_name = stage.name.as_str();
        if let Err(e) = path_component(stage_name) {
            error!("Skipping stage {:?}: {}", stage_name, e);
            plan.skipped_stages.push(stage.name.clone());
            continue;
        }

        let testcases = match catalog.list_testcases(stage_name).await {
            Ok(testcases) => testcases,
            Err(e) => {
                error!("Failed to get testcases for stage {}: {}", stage_name, e);
                plan.skipped_stages.push(stage.name.clone());
                continue;
            }
        };

        for testcase in &testcases {
            info!("Saving testcase info for {}", testcase.name);
            if let Err(e) = mirror.save_testcase_info(testcase, stage_name, &testcase.name) {
                error!(
                    "Error saving testcase info for {}/{}: {}",
                    stage_name, testcase.name, e
                );
                plan.info_failures += 1;
            }
            plan.jobs.extend(DownloadJob::for_testcase(stage_name, testcase));
        }
    }

    plan
}

/// Progress bar on an interactive terminal, hidden otherwise.
fn progress_bar(total: usize) -> indicatif::ProgressBar {
    if !atty::is(atty::Stream::Stderr) {
        return indicatif::ProgressBar::hidden();
    }
    let progress_bar = indicatif::ProgressBar::new(total as u64);
    if let Ok(style) = indicatif::ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed")
    {
        progress_bar.set_style(style.progress_chars("█▓▒░ "));
    }
    progress_bar
}

/// Runs every job to completion with at most `max_concurrent` in flight.
///
/// Failures are counted, never propagated: one bad file does not cancel the
/// others.
pub(crate) async fn execute_jobs(
    catalog: Arc<CatalogClient>,
    mirror: Arc<MirrorStore>,
    jobs: Vec<DownloadJob>,
    max_concurrent: usize,
) -> Arc<DownloadTally> {
    let workers = max_concurrent.min(jobs.len()).max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let tally = Arc::new(DownloadTally::new(jobs.len()));
    let pb = progress_bar(jobs.len());
    pb.set_message(format!("Downloading with {} workers", workers));

    let mut tasks = FuturesUnordered::new();
    for job in jobs {
        let semaphore = Arc::clone(&semaphore);
        let catalog = Arc::clone(&catalog);
        let mirror = Arc::clone(&mirror);
        let tally = Arc::clone(&tally);
        let pb = pb.clone();

        tasks.push(tokio::spawn(async move {
            // The semaphore is never closed, so acquiring always yields a permit.
            let _permit = semaphore.acquire().await.ok();
            let success = run_job(&catalog, &mirror, &job, &tally).await;
            pb.inc(1);
            success
        }));
    }

    while let Some(joined) = tasks.next().await {
        if let Err(e) = joined {
            error!("Download task failed: {}", e);
            tally.record(false);
        }
    }

    pb.finish_and_clear();
    tally
}
