//! Import pipeline: upload bytes to evaluated test records
//!
//! Reading the upload is the only step that can fail. Once the rows are in
//! memory, everything the importer cannot use is skipped and counted in
//! [`ImportStats`], so a failed upload never leaves partial records behind.

use crate::catalog::TestKind;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::evaluate::evaluate_record;
use crate::parser::parse_rows;
use crate::router::route_fields;
use crate::source::{read_bytes, read_path, RawRow};
use crate::table::RecordSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// What happened to the rows of one upload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    /// Upload name
    pub source: String,
    /// Rows after the header
    pub rows_read: usize,
    /// Fields emitted by the parser
    pub fields_emitted: usize,
    /// Fields written into a record
    pub fields_routed: usize,
    /// Fields whose name has no destination in their test
    pub fields_ignored: usize,
    /// Comment, blank and unrecognised rows
    pub skipped_rows: usize,
    /// Valid rows seen while no section was active
    pub dropped_without_test: usize,
    /// Sections that resolved to a test
    pub sections: usize,
    /// Labels of sections that matched no test
    pub unresolved_sections: Vec<String>,
    /// Routed fields per test
    pub per_test: BTreeMap<TestKind, usize>,
}

impl ImportStats {
    /// True when nothing from the upload reached a record
    pub fn is_empty(&self) -> bool {
        self.fields_routed == 0
    }

    /// Tests that received at least one field
    pub fn tests(&self) -> Vec<TestKind> {
        self.per_test.keys().copied().collect()
    }
}

/// Records built from one upload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub records: RecordSet,
    pub stats: ImportStats,
}

/// Import a file from disk into fresh records
pub fn import_path<P: AsRef<Path>>(path: P, config: &IngestConfig) -> Result<ImportOutcome> {
    let path = path.as_ref();
    let rows = read_path(path)?;
    Ok(import_rows(&path.to_string_lossy(), &rows, config))
}

/// Import an upload from its bytes into fresh records
pub fn import_bytes(name: &str, bytes: &[u8], config: &IngestConfig) -> Result<ImportOutcome> {
    let rows = read_bytes(name, bytes)?;
    Ok(import_rows(name, &rows, config))
}

/// Import already-read rows into fresh records
pub fn import_rows(name: &str, rows: &[RawRow], config: &IngestConfig) -> ImportOutcome {
    let mut records = RecordSet::new();
    let stats = import_rows_into(&mut records, name, rows, config);
    ImportOutcome { records, stats }
}

/// Import a file from disk on top of existing records
pub fn import_path_into<P: AsRef<Path>>(records: &mut RecordSet, path: P, config: &IngestConfig) -> Result<ImportStats> {
    let path = path.as_ref();
    let rows = read_path(path)?;
    Ok(import_rows_into(records, &path.to_string_lossy(), &rows, config))
}

/// Import an upload on top of existing records
///
/// Routed values overwrite what the records already hold. Nothing is changed
/// when the upload cannot be read.
pub fn import_bytes_into(
    records: &mut RecordSet,
    name: &str,
    bytes: &[u8],
    config: &IngestConfig,
) -> Result<ImportStats> {
    let rows = read_bytes(name, bytes)?;
    Ok(import_rows_into(records, name, &rows, config))
}

/// Parse, route and evaluate rows into existing records
pub fn import_rows_into(records: &mut RecordSet, name: &str, rows: &[RawRow], config: &IngestConfig) -> ImportStats {
    let parsed = parse_rows(rows, &config.parse_options());

    // New records start from the configured tolerance; imported Tolerance_* fields still win
    for field in &parsed.fields {
        if records.get(field.test).is_none() {
            records.insert(config.new_record(field.test));
        }
    }

    let summary = route_fields(records, &parsed.fields);

    for test in summary.tests() {
        evaluate_record(records.get_or_create(test));
    }

    let stats = ImportStats {
        source: name.to_string(),
        rows_read: parsed.rows_read,
        fields_emitted: parsed.fields.len(),
        fields_routed: summary.routed,
        fields_ignored: summary.ignored,
        skipped_rows: parsed.skipped_rows,
        dropped_without_test: parsed.dropped_without_test,
        sections: parsed.sections,
        unresolved_sections: parsed.unresolved_sections,
        per_test: summary.per_test,
    };

    if stats.is_empty() {
        warn!(source = name, rows = stats.rows_read, "no fields imported; the file looks empty or unrecognised");
    } else {
        info!(
            source = name,
            routed = stats.fields_routed,
            ignored = stats.fields_ignored,
            tests = stats.per_test.len(),
            "imported upload"
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tolerance::{Operator, Remark, Sign, ToleranceSpec, ToleranceType};

    const KVP_CSV: &str = "\
Field Name,Value,Row Index
========== ACCURACY OF OPERATING POTENTIAL (KVP) ==========,,
Table2_SetKV,80,
Table2_ma10,79.5,
Table2_ma100,80.2,
";

    #[test]
    fn test_import_bytes_evaluates() {
        let outcome = import_bytes("kvp.csv", KVP_CSV.as_bytes(), &IngestConfig::default()).unwrap();

        assert_eq!(outcome.stats.fields_routed, 3);
        assert_eq!(outcome.stats.tests(), vec![TestKind::AccuracyOfOperatingPotential]);
        let record = outcome.records.get(TestKind::AccuracyOfOperatingPotential).unwrap();
        assert_eq!(record.remark, Remark::Pass);
        assert_eq!(record.table("table2").unwrap().row(0).unwrap().cell("avgKvp"), Some("79.85"));
    }

    #[test]
    fn test_configured_tolerance_applies_to_new_records() {
        let mut config = IngestConfig::default();
        config.tolerances.insert(
            TestKind::AccuracyOfOperatingPotential,
            ToleranceSpec::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, Some(0.1)),
        );

        let outcome = import_bytes("kvp.csv", KVP_CSV.as_bytes(), &config).unwrap();
        let record = outcome.records.get(TestKind::AccuracyOfOperatingPotential).unwrap();
        assert_eq!(record.tolerance.value, Some(0.1));
        assert_eq!(record.remark, Remark::Fail);
    }

    #[test]
    fn test_imported_tolerance_wins_over_config() {
        let mut config = IngestConfig::default();
        config.tolerances.insert(
            TestKind::AccuracyOfOperatingPotential,
            ToleranceSpec::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, Some(0.1)),
        );
        let csv = format!("{}Tolerance_Value,3,\n", KVP_CSV);

        let outcome = import_bytes("kvp.csv", csv.as_bytes(), &config).unwrap();
        let record = outcome.records.get(TestKind::AccuracyOfOperatingPotential).unwrap();
        assert_eq!(record.tolerance.value, Some(3.0));
        assert_eq!(record.remark, Remark::Pass);
    }

    #[test]
    fn test_import_into_existing_records() {
        let mut records = RecordSet::new();
        let record = records.get_or_create(TestKind::AccuracyOfOperatingPotential);
        record.set_field("notes", "from editor");
        record.table_mut("table2").set_cell(0, "setKV", "70");

        let stats = import_bytes_into(&mut records, "kvp.csv", KVP_CSV.as_bytes(), &IngestConfig::default()).unwrap();
        assert_eq!(stats.fields_routed, 3);

        let record = records.get(TestKind::AccuracyOfOperatingPotential).unwrap();
        assert_eq!(record.field("notes"), Some("from editor"));
        assert_eq!(record.table("table2").unwrap().row(0).unwrap().cell("setKV"), Some("80"));
    }

    #[test]
    fn test_failed_read_leaves_records_untouched() {
        let mut records = RecordSet::new();
        records.get_or_create(TestKind::TotalFiltration).set_field("appliedKV", "80");
        let before = records.clone();

        let err = import_bytes_into(&mut records, "upload.pdf", b"%PDF", &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
        let err = import_bytes_into(&mut records, "upload.csv", b"", &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyFile(_)));
        assert_eq!(records, before);
    }

    #[test]
    fn test_oversized_indices_do_not_grow_tables() {
        let csv = "\
Field Name,Value,Row Index
========== ACCURACY OF OPERATING POTENTIAL (KVP) ==========,,
Table2_SetKV,80,18446744073709551615
========== LINEARITY OF MA LOADING ==========,,
Measurement_MaApplied,100,
Measurement_Meas99999999999,1.0,
Measurement_Header5000,Reading,
";
        let outcome = import_bytes("huge.csv", csv.as_bytes(), &IngestConfig::default()).unwrap();

        assert_eq!(outcome.stats.fields_routed, 2);
        assert_eq!(outcome.stats.fields_ignored, 2);
        let kvp = outcome.records.get(TestKind::AccuracyOfOperatingPotential).unwrap();
        assert_eq!(kvp.table("table2").unwrap().row_count(), 1);
        let linearity = outcome.records.get(TestKind::LinearityOfMaLoading).unwrap();
        assert_eq!(linearity.table("measurements").unwrap().column_count(), 0);
    }

    #[test]
    fn test_unrecognised_upload_is_empty_not_error() {
        let csv = "Field Name,Value\n========== BOGUS TEST ==========,\nTable2_SetKV,80\n";
        let outcome = import_bytes("bogus.csv", csv.as_bytes(), &IngestConfig::default()).unwrap();

        assert!(outcome.stats.is_empty());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.unresolved_sections, vec!["BOGUS TEST".to_string()]);
        assert_eq!(outcome.stats.dropped_without_test, 1);
    }
}
