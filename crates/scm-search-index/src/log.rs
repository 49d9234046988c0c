//! Version log of bootstrapped indices.
//!
//! Bootstrap records, per (index name, type name), the indexer version that last completed a
//! full re-index. [`FileVersionLog`] keeps the entries as a JSON map next to the indices.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use parking_lot::RwLock;
use scm_search_document::epoch_millis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::IndexError;

/// File name of the version log below the data root.
pub const LOG_FILE: &str = "index-log.json";

/// One version log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexLog {
    /// Index name.
    pub index: String,
    /// Index-facing type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Indexer version of the last full re-index.
    pub version: u32,
    /// Completion time in epoch milliseconds.
    pub timestamp: i64,
}

impl IndexLog {
    /// Creates an entry stamped with the current time.
    pub fn new(index: impl Into<String>, type_name: impl Into<String>, version: u32) -> Self {
        Self {
            index: index.into(),
            type_name: type_name.into(),
            version,
            timestamp: epoch_millis(SystemTime::now()),
        }
    }
}

/// Storage for version log entries.
pub trait VersionLogStore: Send + Sync {
    /// Returns the entry of `(index, type_name)`.
    fn get(&self, index: &str, type_name: &str) -> Option<IndexLog>;

    /// Creates or overwrites the entry of `(log.index, log.type_name)`.
    fn put(&self, log: IndexLog) -> Result<(), IndexError>;
}

/// Entries by index name, then type name.
type Entries = BTreeMap<String, BTreeMap<String, IndexLog>>;

/// Version log persisted as a JSON file.
pub struct FileVersionLog {
    /// Location of the file.
    path: PathBuf,
    /// Loaded entries.
    entries: RwLock<Entries>,
}

impl FileVersionLog {
    /// Opens the log at `path`; a missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let path = path.into();
        let entries = if path.is_file() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents).map_err(|e| log_error(&path, &e))?
        } else {
            Entries::new()
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Opens the log kept below the data root.
    pub fn in_root(root: &Path) -> Result<Self, IndexError> {
        Self::open(root.join(LOG_FILE))
    }

    /// Returns the file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all entries, replacing the file.
    fn persist(&self, entries: &Entries) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(|e| log_error(&self.path, &e))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl VersionLogStore for FileVersionLog {
    fn get(&self, index: &str, type_name: &str) -> Option<IndexLog> {
        self.entries.read().get(index)?.get(type_name).cloned()
    }

    fn put(&self, log: IndexLog) -> Result<(), IndexError> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        updated
            .entry(log.index.clone())
            .or_default()
            .insert(log.type_name.clone(), log);
        self.persist(&updated)?;
        *entries = updated;
        debug!(path = %self.path.display(), "version log written");
        Ok(())
    }
}

/// Wraps a serialization failure of the log file.
fn log_error(path: &Path, source: &serde_json::Error) -> IndexError {
    IndexError::Log {
        path: path.to_path_buf(),
        message: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = FileVersionLog::in_root(dir.path()).unwrap();
        assert!(log.get("default", "repository").is_none());
        assert!(!log.path().exists());
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let log = FileVersionLog::in_root(dir.path()).unwrap();
        log.put(IndexLog::new("default", "repository", 3)).unwrap();
        log.put(IndexLog::new("default", "user", 1)).unwrap();
        log.put(IndexLog::new("default", "repository", 4)).unwrap();

        let reopened = FileVersionLog::in_root(dir.path()).unwrap();
        assert_eq!(reopened.get("default", "repository").map(|l| l.version), Some(4));
        assert_eq!(reopened.get("default", "user").map(|l| l.version), Some(1));
        assert!(reopened.get("other", "user").is_none());
    }

    #[test]
    fn file_is_a_json_map() {
        let dir = TempDir::new().unwrap();
        let log = FileVersionLog::in_root(dir.path()).unwrap();
        let mut entry = IndexLog::new("default", "user", 2);
        entry.timestamp = 42;
        log.put(entry).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "default": {
                    "user": {"index": "default", "type": "user", "version": 2, "timestamp": 42}
                }
            })
        );
    }

    #[test]
    fn malformed_file_is_a_log_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOG_FILE), "not json").unwrap();
        let err = FileVersionLog::in_root(dir.path()).err().unwrap();
        assert!(matches!(err, IndexError::Log { .. }));
    }
}
