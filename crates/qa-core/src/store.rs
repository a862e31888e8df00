//! Record persistence keyed by service identifier
//!
//! Each service holds at most one record per test. Saving again replaces the
//! previous record; loading something that was never saved is `Ok(None)`.

use crate::catalog::TestKind;
use crate::error::{Error, Result};
use crate::table::{RecordSet, TestRecord};
use crate::tolerance::Remark;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Returned by a successful save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReceipt {
    pub id: String,
    pub saved_at: DateTime<Utc>,
}

/// A saved record with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub service_id: String,
    pub saved_at: DateTime<Utc>,
    pub record: TestRecord,
}

/// One line of a store listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreEntry {
    pub id: String,
    pub service_id: String,
    pub test: TestKind,
    pub saved_at: DateTime<Utc>,
    pub remark: Remark,
}

impl From<&StoredRecord> for StoreEntry {
    fn from(stored: &StoredRecord) -> Self {
        Self {
            id: stored.id.clone(),
            service_id: stored.service_id.clone(),
            test: stored.record.test,
            saved_at: stored.saved_at,
            remark: stored.record.remark,
        }
    }
}

/// Identifier of a service's record for one test
pub fn record_id(service_id: &str, test: TestKind) -> String {
    format!("{}:{}", service_id, test.slug())
}

/// Save/load collaborator for test records
pub trait RecordStore {
    /// Save a record for a service, replacing any previous one for its test
    fn save(&mut self, service_id: &str, record: &TestRecord) -> Result<SaveReceipt>;

    /// Load a service's record for a test
    fn load(&self, service_id: &str, test: TestKind) -> Result<Option<TestRecord>>;

    /// Load a record by the id returned from [`RecordStore::save`]
    fn load_by_id(&self, id: &str) -> Result<Option<TestRecord>>;

    /// List saved records, optionally for one service only
    fn list(&self, service_id: Option<&str>) -> Result<Vec<StoreEntry>>;

    /// Every saved record of a service
    fn load_service(&self, service_id: &str) -> Result<RecordSet> {
        let mut records = RecordSet::new();
        for entry in self.list(Some(service_id))? {
            if let Some(record) = self.load_by_id(&entry.id)? {
                records.insert(record);
            }
        }
        Ok(records)
    }

    /// Save every record of a set
    fn save_all(&mut self, service_id: &str, records: &RecordSet) -> Result<Vec<SaveReceipt>> {
        records.iter().map(|record| self.save(service_id, record)).collect()
    }
}

fn check_service_id(service_id: &str) -> Result<()> {
    if service_id.trim().is_empty() {
        return Err(Error::Store("service id must not be empty".to_string()));
    }
    Ok(())
}

/// In-memory store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    records: BTreeMap<String, StoredRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn stored(service_id: &str, record: &TestRecord) -> Result<StoredRecord> {
        check_service_id(service_id)?;
        Ok(StoredRecord {
            id: record_id(service_id, record.test),
            service_id: service_id.to_string(),
            saved_at: Utc::now(),
            record: record.clone(),
        })
    }

    fn insert(&mut self, stored: StoredRecord) -> SaveReceipt {
        let receipt = SaveReceipt {
            id: stored.id.clone(),
            saved_at: stored.saved_at,
        };
        self.records.insert(stored.id.clone(), stored);
        receipt
    }
}

impl RecordStore for MemoryStore {
    fn save(&mut self, service_id: &str, record: &TestRecord) -> Result<SaveReceipt> {
        let stored = Self::stored(service_id, record)?;
        Ok(self.insert(stored))
    }

    fn load(&self, service_id: &str, test: TestKind) -> Result<Option<TestRecord>> {
        self.load_by_id(&record_id(service_id, test))
    }

    fn load_by_id(&self, id: &str) -> Result<Option<TestRecord>> {
        Ok(self.records.get(id).map(|stored| stored.record.clone()))
    }

    fn list(&self, service_id: Option<&str>) -> Result<Vec<StoreEntry>> {
        Ok(self
            .records
            .values()
            .filter(|stored| service_id.map_or(true, |s| stored.service_id == s))
            .map(StoreEntry::from)
            .collect())
    }
}

/// Store persisted as one JSON file, rewritten on every save
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open a store file, or start empty if it does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "starting new record store");
            return Ok(Self {
                path: path.to_path_buf(),
                inner: MemoryStore::new(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let inner: MemoryStore = serde_json::from_str(&content)?;
        debug!(path = %path.display(), records = inner.len(), "opened record store");

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, store: &MemoryStore) -> Result<()> {
        let content = serde_json::to_string_pretty(store)?;
        fs::write(&self.path, content)
            .map_err(|e| Error::Store(format!("failed to write '{}': {}", self.path.display(), e)))
    }
}

impl RecordStore for JsonFileStore {
    fn save(&mut self, service_id: &str, record: &TestRecord) -> Result<SaveReceipt> {
        let stored = MemoryStore::stored(service_id, record)?;

        // Only keep the new record once it is on disk
        let mut next = self.inner.clone();
        let receipt = next.insert(stored);
        self.write(&next)?;
        self.inner = next;

        info!(id = %receipt.id, path = %self.path.display(), "saved record");
        Ok(receipt)
    }

    fn load(&self, service_id: &str, test: TestKind) -> Result<Option<TestRecord>> {
        self.inner.load(service_id, test)
    }

    fn load_by_id(&self, id: &str) -> Result<Option<TestRecord>> {
        self.inner.load_by_id(id)
    }

    fn list(&self, service_id: Option<&str>) -> Result<Vec<StoreEntry>> {
        self.inner.list(service_id)
    }
}
