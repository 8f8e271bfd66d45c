use clap::Parser;
use stagesync::{sync_mirror, SyncConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "stagesync")]
#[command(about = "Mirror stage testcases and files from the catalog API", long_about = None)]
#[command(version)]
struct Args {
    /// Catalog API base URL
    #[arg(long, default_value = "http://rcomp-cases.wxzheng.pro/api")]
    base_url: String,

    /// Mirror directory
    #[arg(short, long, default_value = "@official")]
    output: PathBuf,

    /// Maximum number of concurrent file downloads
    #[arg(short, long, default_value_t = stagesync::types::DEFAULT_MAX_CONCURRENT_DOWNLOADS)]
    jobs: usize,

    /// Per-request timeout (e.g. "30s", "2m")
    #[arg(long, default_value = "30s")]
    timeout: humantime::Duration,

    /// Ignore the stored snapshot and refresh every stage
    #[arg(long)]
    force: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("stagesync={}", log_level))
        .init();

    info!("Catalog: {}", args.base_url);
    info!("Mirror directory: {:?}", args.output);

    if args.jobs == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }

    let config = SyncConfig {
        base_url: args.base_url,
        mirror_root: args.output,
        max_concurrent_downloads: args.jobs,
        request_timeout: args.timeout.into(),
        force_full_sync: args.force,
    };

    match sync_mirror(&config).await {
        Ok(report) if report.is_complete() => Ok(ExitCode::SUCCESS),
        Ok(report) => {
            warn!(
                "Finished with {} failed download(s), {} skipped stage(s), {} unsaved testcase record(s)",
                report.failed,
                report.skipped_stages.len(),
                report.info_failures
            );
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            error!("Sync failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
