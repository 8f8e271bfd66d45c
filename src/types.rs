//! Data structures for catalog sync operations.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Deserializes a field that is present, keeping an explicit `null` instead of collapsing it to `None`.
///
/// Paired with `default` and `skip_serializing_if = "Option::is_none"`, this
/// writes back absent fields as absent and `null` fields as `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Revision information reported alongside the stage listing.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GitInfo {
    /// Commit hash of the catalog content, when the server knows it.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stage as listed by `GET /stages`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    /// Opaque change marker. Only compared for equality.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stage {
    /// The change marker, with an explicit `null` treated like an absent one.
    pub fn marker(&self) -> Option<&Value> {
        self.last_updated.as_ref().filter(|v| !v.is_null())
    }
}

/// One point-in-time catalog listing.
///
/// Persisted verbatim as `stages.json` in the mirror root and compared
/// against the next listing to decide what needs refreshing.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StagesSnapshot {
    #[serde(
        rename = "gitInfo",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub git_info: Option<Option<GitInfo>>,
    pub stages: Vec<Stage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StagesSnapshot {
    /// The revision hash, if present and non-empty.
    pub fn git_hash(&self) -> Option<&str> {
        self.git_info
            .as_ref()
            .and_then(Option::as_ref)
            .and_then(|info| info.git_hash.as_ref())
            .and_then(Option::as_deref)
            .filter(|hash| !hash.is_empty())
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// A testcase as listed by `GET /stages/{stage}/testcases`.
///
/// Fields beyond the ones we act on are kept so `testcase_info.json`
/// carries the full record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Testcase {
    pub name: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub source_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub input_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub output_path: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Testcase {
    /// Remote path stored under `key`, ignoring absent and empty values.
    pub fn remote_path(&self, key: PathKey) -> Option<&str> {
        let path = match key {
            PathKey::Source => &self.source_path,
            PathKey::Input => &self.input_path,
            PathKey::Output => &self.output_path,
        };
        path.as_ref()
            .and_then(Option::as_deref)
            .filter(|p| !p.is_empty())
    }
}

/// Which of the three testcase files a download job refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKey {
    Source,
    Input,
    Output,
}

impl PathKey {
    /// Enqueue order for a testcase's files.
    pub const ALL: [PathKey; 3] = [PathKey::Source, PathKey::Input, PathKey::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            PathKey::Source => "source_path",
            PathKey::Input => "input_path",
            PathKey::Output => "output_path",
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file fetch scheduled for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub stage_name: String,
    pub testcase_name: String,
    pub path_key: PathKey,
    pub remote_file_path: String,
}

impl DownloadJob {
    /// Builds one job per populated path key of `testcase`.
    pub fn for_testcase(stage_name: &str, testcase: &Testcase) -> Vec<DownloadJob> {
        PathKey::ALL
            .iter()
            .filter_map(|&key| {
                testcase.remote_path(key).map(|path| DownloadJob {
                    stage_name: stage_name.to_string(),
                    testcase_name: testcase.name.clone(),
                    path_key: key,
                    remote_file_path: path.to_string(),
                })
            })
            .collect()
    }
}

/// Configuration for a sync run.
///
/// # Example
///
/// ```
/// use stagesync::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig {
///     base_url: "http://localhost:8080/api".to_string(),
///     mirror_root: "@official".into(),
///     max_concurrent_downloads: 4,
///     request_timeout: Duration::from_secs(10),
///     force_full_sync: false,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the catalog API, without trailing slash (e.g., `<http://host/api>`)
    pub base_url: String,
    /// Directory the mirror is written to.
    pub mirror_root: PathBuf,
    /// Upper bound on in-flight file downloads (default: 10).
    pub max_concurrent_downloads: usize,
    /// Per-request timeout applied by the HTTP client (default: 30s).
    pub request_timeout: Duration,
    /// Ignore the stored snapshot and refresh every stage (default: false).
    pub force_full_sync: bool,
}

/// Built-in cap on concurrent downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 10;

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://rcomp-cases.wxzheng.pro/api".to_string(),
            mirror_root: PathBuf::from("@official"),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            request_timeout: Duration::from_secs(30),
            force_full_sync: false,
        }
    }
}
