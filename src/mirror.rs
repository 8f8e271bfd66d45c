//! Local mirror layout and persistence.

use crate::error::SyncError;
use crate::types::{StagesSnapshot, Testcase};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the persisted catalog snapshot in the mirror root.
pub const SNAPSHOT_FILE: &str = "stages.json";

/// Name of the per-testcase metadata record.
pub const TESTCASE_INFO_FILE: &str = "testcase_info.json";

/// Validates a server-supplied name for use as one path component.
pub fn path_component(name: &str) -> Result<&str, SyncError> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(SyncError::UnsafePathComponent(name.to_string()));
    }
    Ok(name)
}

/// Local file name for a remote path: its last `/`-separated segment.
pub fn local_file_name(remote_file_path: &str) -> Result<&str, SyncError> {
    let base = remote_file_path
        .rsplit('/')
        .next()
        .unwrap_or(remote_file_path);
    path_component(base)
}

/// Serializes with 4-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// The on-disk mirror rooted at one directory.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    /// `<root>/<stage>/<testcase>`, with both names validated.
    pub fn testcase_dir(
        &self,
        stage_name: &str,
        testcase_name: &str,
    ) -> Result<PathBuf, SyncError> {
        Ok(self
            .root
            .join(path_component(stage_name)?)
            .join(path_component(testcase_name)?))
    }

    /// Where the content of `remote_file_path` lands for this testcase.
    pub fn content_path(
        &self,
        stage_name: &str,
        testcase_name: &str,
        remote_file_path: &str,
    ) -> Result<PathBuf, SyncError> {
        Ok(self
            .testcase_dir(stage_name, testcase_name)?
            .join(local_file_name(remote_file_path)?))
    }

    /// Creates the mirror root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), SyncError> {
        std::fs::create_dir_all(&self.root).map_err(|e| SyncError::filesystem(&self.root, e))
    }

    /// Loads the snapshot written by the previous run.
    ///
    /// This is a best-effort cache: a missing, unreadable or unparseable
    /// file all yield `None`, which callers treat as a first run.
    pub fn load_previous_snapshot(&self) -> Option<StagesSnapshot> {
        let path = self.snapshot_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => {
                debug!("Loaded previous snapshot from {}", path.display());
                Some(snapshot)
            }
            Err(e) => {
                warn!("Ignoring malformed snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrites the stored snapshot with `snapshot`.
    pub fn save_previous_snapshot(&self, snapshot: &StagesSnapshot) -> Result<(), SyncError> {
        let path = self.snapshot_path();
        let json = to_pretty_json(snapshot)?;
        std::fs::write(&path, json).map_err(|e| SyncError::filesystem(&path, e))
    }

    /// Writes `testcase_info.json` with the full testcase record.
    pub fn save_testcase_info(
        &self,
        testcase: &Testcase,
        stage_name: &str,
        testcase_name: &str,
    ) -> Result<PathBuf, SyncError> {
        let dir = self.testcase_dir(stage_name, testcase_name)?;
        std::fs::create_dir_all(&dir).map_err(|e| SyncError::filesystem(&dir, e))?;

        let path = dir.join(TESTCASE_INFO_FILE);
        let json = to_pretty_json(testcase)?;
        std::fs::write(&path, json).map_err(|e| SyncError::filesystem(&path, e))?;
        Ok(path)
    }

    /// Writes downloaded text content, replacing any existing file.
    pub async fn save_file_content(
        &self,
        content: &str,
        stage_name: &str,
        testcase_name: &str,
        remote_file_path: &str,
    ) -> Result<PathBuf, SyncError> {
        let path = self.content_path(stage_name, testcase_name, remote_file_path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::filesystem(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| SyncError::filesystem(&path, e))?;
        Ok(path)
    }
}
