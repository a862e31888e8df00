//! Error types for qa-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in qa-core
///
/// Only terminal failures live here. Rows, sections and values the importer
/// cannot use are counted in [`crate::import::ImportStats`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upload contained no bytes or no rows
    #[error("file '{0}' is empty")]
    EmptyFile(String),

    /// Extension is not one of the supported spreadsheet formats
    #[error("unsupported file type '{0}' (expected .csv, .xlsx, .xls, .xlsm, .xlsb or .ods)")]
    UnsupportedFileType(String),

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{name}': {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// Workbook could not be opened or read
    #[error("failed to read workbook '{name}': {message}")]
    Excel { name: String, message: String },

    /// Workbook has no worksheet to read
    #[error("workbook '{0}' has no sheets")]
    NoSheets(String),

    /// A stored or deserialized record breaks the table invariants
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Test name could not be resolved to a canonical test
    #[error("unknown test '{0}'")]
    UnknownTest(String),

    /// Persistence collaborator failure
    #[error("store error: {0}")]
    Store(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
