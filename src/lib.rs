//! StageSync - mirror stage testcases from a remote catalog API
//!
//! This library lists the stages of a catalog, works out which of them changed
//! since the previous run, and downloads the testcase records and their
//! source/input/output files into a local directory tree.
//!
//! # Features
//!
//! - **Change Detection**: Skip the run when the catalog revision is unchanged,
//!   otherwise refresh only the stages whose markers moved
//! - **Parallel Downloads**: Bounded pool of concurrent file fetches
//! - **Failure Isolation**: A failing stage or file never aborts the rest
//!
//! # Example
//!
//! ```no_run
//! use stagesync::{sync_mirror, SyncConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let report = sync_mirror(&config).await?;
//! assert!(report.succeeded() <= report.total);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod detect;
pub mod download;
pub mod error;
pub mod mirror;
pub mod orchestrator;
pub mod types;

pub use catalog::CatalogClient;
pub use detect::{detect_changes, NoOpReason, SyncDecision};
pub use error::SyncError;
pub use mirror::MirrorStore;
pub use orchestrator::{sync_mirror, SyncReport};
pub use types::{DownloadJob, PathKey, Stage, StagesSnapshot, SyncConfig, Testcase};
