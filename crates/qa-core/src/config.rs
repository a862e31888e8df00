//! Ingestion configuration and batch files

use crate::catalog::TestKind;
use crate::error::{Error, Result};
use crate::parser::ParseOptions;
use crate::table::TestRecord;
use crate::tolerance::ToleranceSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows scanned for the header before falling back to fixed columns
    pub header_scan_rows: usize,
    /// Treat a repeated row-start value as the same logical row
    pub merge_repeated_row_start: bool,
    /// Tolerances replacing the built-in defaults of new records
    pub tolerances: BTreeMap<TestKind, ToleranceSpec>,
    /// JSON record store used when no store is given on the command line
    pub store_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let options = ParseOptions::default();
        Self {
            header_scan_rows: options.header_scan_rows,
            merge_repeated_row_start: options.merge_repeated_row_start,
            tolerances: BTreeMap::new(),
            store_path: None,
        }
    }
}

impl IngestConfig {
    /// Load a config file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the config to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            header_scan_rows: self.header_scan_rows,
            merge_repeated_row_start: self.merge_repeated_row_start,
        }
    }

    /// Configured tolerance for a test, if any
    pub fn tolerance_for(&self, test: TestKind) -> Option<ToleranceSpec> {
        self.tolerances.get(&test).copied()
    }

    /// Fresh record for a test with the configured tolerance applied
    pub fn new_record(&self, test: TestKind) -> TestRecord {
        let mut record = TestRecord::new(test);
        if let Some(spec) = self.tolerance_for(test) {
            record.tolerance = spec;
        }
        record
    }
}

/// A batch of uploads imported for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFile {
    /// Config file; defaults apply when absent
    #[serde(default)]
    pub config: Option<PathBuf>,
    /// JSON record store receiving the results
    pub store: PathBuf,
    /// Service the records belong to
    pub service_id: String,
    /// Files or directories to import
    pub inputs: Vec<PathBuf>,
}

impl BatchFile {
    /// Load a batch file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the batch file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Config named by the batch, or the defaults
    pub fn load_config(&self) -> Result<IngestConfig> {
        match &self.config {
            Some(path) => IngestConfig::load(path),
            None => Ok(IngestConfig::default()),
        }
    }
}
