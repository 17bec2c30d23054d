//! Durable run state: the download ledger, the failure list and statistics
//!
//! Every write goes to a temporary sibling first and is then renamed over the
//! target, so an interrupted run leaves either the old or the new file, never
//! a truncated one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::harvest_error::PersistenceError;
use crate::domain::{DownloadRecord, RunStatistics};

/// `<path><suffix>`, e.g. `metadata.json.corrupted`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub async fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), PersistenceError>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let temporary = with_suffix(path, ".tmp");
    fs::write(&temporary, content)
        .await
        .map_err(|e| PersistenceError::io(&temporary, e))?;
    fs::rename(&temporary, path)
        .await
        .map_err(|e| PersistenceError::io(path, e))?;
    Ok(())
}

/// Read a JSON file, `None` if it does not exist.
///
/// Unparseable content is reported as `Some(Err(..))` so callers can decide
/// whether to quarantine it.
async fn read_json<T>(path: &Path) -> Result<Option<Result<T, serde_json::Error>>, PersistenceError>
where
    T: for<'de> Deserialize<'de>,
{
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

/// Append-only store of fully processed photos, keyed by id.
///
/// The whole ledger is rewritten after every append.
#[derive(Debug)]
pub struct PersistenceLedger {
    path: PathBuf,
    records: Vec<DownloadRecord>,
    ids: HashSet<String>,
}

impl PersistenceLedger {
    /// Load the ledger at `path`, or start empty if there is none.
    ///
    /// A file that cannot be parsed is moved aside to `<path>.corrupted`
    /// rather than overwritten. Duplicate ids in a loaded file keep their
    /// first entry.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let loaded: Vec<DownloadRecord> = match read_json(&path).await? {
            None => Vec::new(),
            Some(Ok(records)) => records,
            Some(Err(e)) => {
                let quarantine = with_suffix(&path, ".corrupted");
                warn!("Ledger {:?} is unreadable ({}); moving it to {:?}", path, e, quarantine);
                fs::rename(&path, &quarantine)
                    .await
                    .map_err(|e| PersistenceError::io(&quarantine, e))?;
                Vec::new()
            }
        };

        let mut ledger = Self {
            path,
            records: Vec::with_capacity(loaded.len()),
            ids: HashSet::with_capacity(loaded.len()),
        };
        let total = loaded.len();
        for record in loaded {
            if ledger.ids.insert(record.id.clone()) {
                ledger.records.push(record);
            }
        }
        if ledger.records.len() < total {
            warn!("Dropped {} duplicate ledger entries", total - ledger.records.len());
        }

        info!("Loaded {} ledger entries from {:?}", ledger.records.len(), ledger.path);
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DownloadRecord] {
        &self.records
    }

    /// Add a record and persist the full ledger.
    ///
    /// Returns `false`, without writing, if the id is already present.
    pub async fn append(&mut self, record: DownloadRecord) -> Result<bool, PersistenceError> {
        if !self.ids.insert(record.id.clone()) {
            debug!("Ledger already has {}", record.id);
            return Ok(false);
        }
        self.records.push(record);
        write_json_atomic(&self.path, &self.records).await?;
        Ok(true)
    }
}

/// One photo that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub id: String,
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredFailure {
    Entry(FailureEntry),
    Id(String),
}

/// Ids that failed in this or an earlier run, with the latest reason.
///
/// Entries are unique by id and keep their first-seen order.
#[derive(Debug)]
pub struct FailureList {
    path: PathBuf,
    entries: Vec<FailureEntry>,
}

impl FailureList {
    /// Load failures recorded by earlier runs; an unreadable file is ignored.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let mut list = Self {
            path,
            entries: Vec::new(),
        };
        match read_json::<Vec<StoredFailure>>(&list.path).await? {
            None => {}
            Some(Ok(stored)) => {
                for failure in stored {
                    let entry = match failure {
                        StoredFailure::Entry(entry) => entry,
                        StoredFailure::Id(id) => FailureEntry {
                            id,
                            reason: String::new(),
                        },
                    };
                    list.record(entry.id, entry.reason);
                }
                info!("Loaded {} earlier failures from {:?}", list.len(), list.path);
            }
            Some(Err(e)) => warn!("Ignoring unreadable failure list {:?}: {}", list.path, e),
        }
        Ok(list)
    }

    /// Record a failure; a repeated id keeps its position and takes the new reason.
    pub fn record(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        let id = id.into();
        let reason = reason.into();
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.reason = reason,
            None => self.entries.push(FailureEntry { id, reason }),
        }
    }

    /// Forget a failure, e.g. once the photo has been processed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FailureEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, &self.entries).await
    }
}

/// Write the run counters to `path`.
pub async fn write_statistics(path: &Path, statistics: &RunStatistics) -> Result<(), PersistenceError> {
    write_json_atomic(path, statistics).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PhotoMetadata;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> DownloadRecord {
        DownloadRecord {
            id: id.to_string(),
            filename: format!("flickr_{id}_alice.jpg"),
            size_bytes: 3,
            downloaded_at: Utc::now(),
            source_url: format!("https://live.staticflickr.com/1/{id}_ab_b.jpg"),
            page_url: format!("https://www.flickr.com/photos/alice/{id}/"),
            attribution_text: "Photo by Alice on Flickr".to_string(),
            attribution_markup: "Photo by Alice".to_string(),
            metadata: PhotoMetadata {
                id: id.to_string(),
                ..PhotoMetadata::default()
            },
        }
    }

    #[tokio::test]
    async fn test_append_persists_whole_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");

        let mut ledger = PersistenceLedger::open(&path).await.unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.append(record("1")).await.unwrap());
        assert!(ledger.append(record("2")).await.unwrap());
        assert!(!ledger.append(record("1")).await.unwrap());

        let reopened = PersistenceLedger::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("1") && reopened.contains("2"));
        assert!(!with_suffix(&path, ".tmp").exists());
    }

    #[tokio::test]
    async fn test_duplicates_in_file_keep_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        let mut second = record("1");
        second.filename = "other.jpg".to_string();
        std::fs::write(&path, serde_json::to_string(&vec![record("1"), second, record("2")]).unwrap()).unwrap();

        let ledger = PersistenceLedger::open(&path).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.records()[0].filename, "flickr_1_alice.jpg");
    }

    #[tokio::test]
    async fn test_corrupt_ledger_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "[{ not json").unwrap();

        let ledger = PersistenceLedger::open(&path).await.unwrap();
        assert!(ledger.is_empty());
        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("metadata.json.corrupted")).unwrap(), "[{ not json");
    }

    #[tokio::test]
    async fn test_failure_list_merges_prior_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("failed_downloads.json");
        std::fs::write(&path, r#"["10", {"id": "11", "reason": "timeout"}, "10"]"#).unwrap();

        let mut failures = FailureList::open(&path).await.unwrap();
        assert_eq!(failures.len(), 2);

        failures.record("11", "no asset");
        failures.record("12", "auth wall");
        assert!(failures.remove("10"));
        failures.save().await.unwrap();

        let reopened = FailureList::open(&path).await.unwrap();
        let ids: Vec<&str> = reopened.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["11", "12"]);
        assert_eq!(reopened.entries()[0].reason, "no asset");
    }

    #[tokio::test]
    async fn test_write_failure_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let result = write_statistics(&blocker.join("statistics.json"), &RunStatistics::default()).await;
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
    }
}
