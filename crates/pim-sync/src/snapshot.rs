//! Last-pushed representation per product, used for change detection.
//!
//! File layout: one `<code>-<remote_id>.json` per product in the export
//! directory. Keeping the remote id in the file name lets an update recover
//! the id even if the mapping file has been lost.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::error::SyncError;
use crate::properties::write_atomic;

/// A previously pushed representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub remote_id: u64,
    /// `None` when the file exists but its body could not be parsed. The id
    /// is still usable, so the product takes the update path.
    pub body: Option<Value>,
}

pub trait SnapshotStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] when the snapshot location cannot be listed.
    fn load(&self, code: &str) -> Result<Option<Snapshot>, SyncError>;

    /// Stores `body` as the latest snapshot for `code`, replacing any older one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] or [`SyncError::Json`] when the snapshot
    /// cannot be written.
    fn save(&self, code: &str, remote_id: u64, body: &Value) -> Result<(), SyncError>;
}

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, code: &str, remote_id: u64) -> PathBuf {
        self.dir.join(format!("{code}-{remote_id}.json"))
    }

    /// Lists every snapshot file belonging to `code`, lowest id first.
    fn find(&self, code: &str) -> Result<Vec<(u64, PathBuf)>, SyncError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncError::io(&self.dir, e)),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = snapshot_id(name, code) {
                found.push((id, entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Extracts the remote id when `file_name` is `<code>-<digits>.json`.
///
/// Requiring the whole tail to be digits keeps `A-1-5.json` (code `A-1`)
/// from being read as a snapshot of code `A`.
fn snapshot_id(file_name: &str, code: &str) -> Option<u64> {
    let tail = file_name
        .strip_suffix(".json")?
        .strip_prefix(code)?
        .strip_prefix('-')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, code: &str) -> Result<Option<Snapshot>, SyncError> {
        let mut found = self.find(code)?;
        let Some((remote_id, path)) = found.pop() else {
            return Ok(None);
        };
        if !found.is_empty() {
            tracing::warn!(
                code,
                remote_id,
                stale = found.len(),
                "multiple snapshots for one product, using the highest id"
            );
        }

        let body = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "snapshot body is not valid JSON, treating as absent"
                    );
                    None
                }
            },
            Err(e) => return Err(SyncError::io(path, e)),
        };

        Ok(Some(Snapshot { remote_id, body }))
    }

    fn save(&self, code: &str, remote_id: u64, body: &Value) -> Result<(), SyncError> {
        let path = self.path_for(code, remote_id);
        let text = serde_json::to_string_pretty(body).map_err(|e| SyncError::Json {
            context: format!("snapshot for {code}"),
            source: e,
        })?;
        write_atomic(&path, &text).map_err(|e| SyncError::io(&path, e))?;

        for (stale_id, stale_path) in self.find(code)? {
            if stale_id != remote_id {
                if let Err(e) = std::fs::remove_file(&stale_path) {
                    tracing::warn!(
                        path = %stale_path.display(),
                        error = %e,
                        "could not remove superseded snapshot"
                    );
                }
            }
        }
        Ok(())
    }
}

/// In-memory snapshot store for tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, Snapshot>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a snapshot as if a previous run had pushed it.
    pub fn insert(&self, code: &str, remote_id: u64, body: Option<Value>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.to_owned(), Snapshot { remote_id, body });
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<Snapshot> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, code: &str) -> Result<Option<Snapshot>, SyncError> {
        Ok(self.get(code))
    }

    fn save(&self, code: &str, remote_id: u64, body: &Value) -> Result<(), SyncError> {
        self.insert(code, remote_id, Some(body.clone()));
        Ok(())
    }
}
