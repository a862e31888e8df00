//! Directory scanner for discovering importable QA uploads

use crate::error::Result;
use crate::source::{SourceFormat, SUPPORTED_EXTENSIONS};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A file the importer can read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadFile {
    /// Full path to the file
    pub path: PathBuf,
    pub format: SourceFormat,
}

/// Result of scanning directories
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Root directories that were scanned
    pub roots: Vec<PathBuf>,
    /// Discovered files, sorted by path
    pub files: Vec<UploadFile>,
    /// Total number of files found
    pub total_files: usize,
}

impl ScanResult {
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }
}

/// Whether a path has one of the supported spreadsheet extensions
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Scan one or more directories for importable files
///
/// A root that is itself a supported file is returned as is.
pub fn scan_directory<P: AsRef<Path>>(roots: &[P]) -> Result<ScanResult> {
    let mut files = Vec::new();

    for root in roots {
        let root = root.as_ref();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type().is_file() || !is_supported(path) {
                continue;
            }
            // Spreadsheet lock files
            if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("~$")) {
                continue;
            }

            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                let format = SourceFormat::from_name(name)?;
                debug!(path = %path.display(), ?format, "found upload");
                files.push(UploadFile {
                    path: path.to_path_buf(),
                    format,
                });
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);

    Ok(ScanResult {
        roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
        total_files: files.len(),
        files,
    })
}
