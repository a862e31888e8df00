//! qa-core: Core library for importing and evaluating radiology QA test data
//!
//! This library provides functionality to:
//! - Read CSV and Excel uploads into raw rows
//! - Locate the "Field Name / Value / Row Index" header
//! - Parse sectioned rows into import fields and route them into test records
//! - Keep dynamic measurement columns consistent across rows
//! - Evaluate records against tolerance specifications
//! - Save and load records per service

pub mod catalog;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod header;
pub mod import;
pub mod normalize;
pub mod parser;
pub mod path;
pub mod router;
pub mod scanner;
pub mod source;
pub mod store;
pub mod table;
pub mod tolerance;

pub use catalog::{TestKind, TestLayout};
pub use config::{BatchFile, IngestConfig};
pub use error::{Error, Result};
pub use evaluate::{evaluate_all, evaluate_record};
pub use header::{locate_header, ColumnLayout};
pub use import::{
    import_bytes, import_bytes_into, import_path, import_path_into, import_rows, import_rows_into, ImportOutcome,
    ImportStats,
};
pub use normalize::normalize_test_name;
pub use parser::{parse_csv_str, parse_rows, ImportField, ParseOptions, ParseOutput};
pub use path::{FieldPath, PathError};
pub use router::{route_field, route_fields, RouteSummary};
pub use scanner::{scan_directory, ScanResult, UploadFile};
pub use source::{read_bytes, read_path, RawRow, SourceFormat};
pub use store::{JsonFileStore, MemoryStore, RecordStore, SaveReceipt, StoreEntry};
pub use table::{RecordSet, Row, RowCollection, TestRecord};
pub use tolerance::{check_tolerance, Operator, Remark, Sign, ToleranceSpec, ToleranceType};
