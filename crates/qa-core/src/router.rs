//! Routing of import fields into test records

use crate::catalog::TestKind;
use crate::parser::ImportField;
use crate::path::{FieldPath, PathError, ToleranceField};
use crate::table::{RecordSet, TestRecord};
use crate::tolerance::{parse_number, Operator, Sign, ToleranceSpec, ToleranceType};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Counts from routing a batch of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteSummary {
    /// Fields written into a record
    pub routed: usize,
    /// Fields whose name has no destination in their test
    pub ignored: usize,
    /// Routed fields per test
    pub per_test: BTreeMap<TestKind, usize>,
}

impl RouteSummary {
    pub fn tests(&self) -> Vec<TestKind> {
        self.per_test.keys().copied().collect()
    }
}

/// Route one field into its test's record, creating the record if needed
///
/// Routing is last-write-wins per slot: routing the same field twice leaves
/// the record as routing it once.
pub fn route_field(records: &mut RecordSet, field: &ImportField) -> Result<FieldPath, PathError> {
    let layout = field.test.layout();
    let path = FieldPath::resolve(layout, &field.field_name, field.row_index)?;
    apply_path(records.get_or_create(field.test), &path, &field.value);
    Ok(path)
}

/// Route a batch of fields, logging and counting the ones without a destination
pub fn route_fields(records: &mut RecordSet, fields: &[ImportField]) -> RouteSummary {
    let mut summary = RouteSummary::default();

    for field in fields {
        match route_field(records, field) {
            Ok(path) => {
                debug!(test = field.test.slug(), field = %field.field_name, ?path, "routed field");
                summary.routed += 1;
                *summary.per_test.entry(field.test).or_default() += 1;
            }
            Err(e) => {
                warn!(test = field.test.slug(), field = %field.field_name, "ignoring field: {}", e);
                summary.ignored += 1;
            }
        }
    }

    summary
}

/// Write a value at a resolved path
pub fn apply_path(record: &mut TestRecord, path: &FieldPath, value: &str) {
    match path {
        FieldPath::Scalar { key } => record.set_field(key.as_str(), value),
        FieldPath::Cell { collection, row, key } => {
            record.table_mut(collection).set_cell(*row, key.as_str(), value);
        }
        FieldPath::Measured {
            collection,
            family,
            row,
            column,
        } => {
            let family = family.0;
            record
                .table_mut(collection)
                .set_measured(*row, *column, value, |i| family.default_header(i));
        }
        FieldPath::Header {
            collection,
            family,
            column,
        } => {
            let family = family.0;
            record
                .table_mut(collection)
                .set_header(*column, value, |i| family.default_header(i));
        }
        FieldPath::Tolerance(part) => apply_tolerance(&mut record.tolerance, *part, value),
    }
}

/// Update one part of a tolerance bundle from its imported text
///
/// Unparsable operators, signs and types leave the previous setting; an
/// unparsable value clears it so no stale boundary is evaluated.
fn apply_tolerance(spec: &mut ToleranceSpec, part: ToleranceField, value: &str) {
    let value = value.trim();
    let result = match part {
        ToleranceField::Operator => value.parse::<Operator>().map(|op| spec.operator = op),
        ToleranceField::Sign => value.parse::<Sign>().map(|sign| spec.sign = sign),
        ToleranceField::Type => value.parse::<ToleranceType>().map(|kind| spec.kind = kind),
        ToleranceField::Value => {
            spec.value = parse_number(value);
            if spec.value.is_none() && !value.is_empty() {
                Err(format!("'{}' is not a number", value))
            } else {
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        warn!("ignoring tolerance {:?}: {}", part, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(test: TestKind, name: &str, value: &str, row: usize) -> ImportField {
        ImportField::new(name, value, row, test)
    }

    #[test]
    fn test_route_named_cells() {
        let mut records = RecordSet::new();
        let kvp = TestKind::AccuracyOfOperatingPotential;
        let fields = vec![
            field(kvp, "Table2_SetKV", "80", 0),
            field(kvp, "Table2_ma10", "79.5", 0),
            field(kvp, "Table2_ma100", "80.2", 0),
        ];

        let summary = route_fields(&mut records, &fields);
        assert_eq!(summary.routed, 3);
        assert_eq!(summary.ignored, 0);
        assert_eq!(summary.tests(), vec![kvp]);

        let row = records.get(kvp).unwrap().table("table2").unwrap().row(0).unwrap();
        assert_eq!(row.cell("setKV"), Some("80"));
        assert_eq!(row.cell("ma10"), Some("79.5"));
        assert_eq!(row.cell("ma100"), Some("80.2"));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_routing_twice_is_idempotent() {
        let test = TestKind::ConsistencyOfRadiationOutput;
        let fields = vec![
            field(test, "OutputRow_kV", "80", 1),
            field(test, "OutputRow_Meas2", "5.1", 1),
        ];

        let mut once = RecordSet::new();
        route_fields(&mut once, &fields);

        let mut twice = RecordSet::new();
        route_fields(&mut twice, &fields);
        route_fields(&mut twice, &fields);

        assert_eq!(once, twice);
        let table = twice.get(test).unwrap().table("outputRows").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_last_write_wins() {
        let mut records = RecordSet::new();
        let test = TestKind::TotalFiltration;
        route_fields(
            &mut records,
            &[
                field(test, "Settings_AppliedKV", "70", 0),
                field(test, "Settings_AppliedKV", "80", 0),
            ],
        );
        assert_eq!(records.get(test).unwrap().field("appliedKV"), Some("80"));
    }

    #[test]
    fn test_measured_columns_grow_all_rows() {
        let mut records = RecordSet::new();
        let test = TestKind::LinearityOfMaLoading;
        route_fields(
            &mut records,
            &[
                field(test, "Measurement_MaApplied", "50", 0),
                field(test, "Measurement_Meas1", "1.0", 0),
                field(test, "Measurement_MaApplied", "100", 1),
                field(test, "Measurement_Meas3", "2.1", 1),
                field(test, "Measurement_Header3", "Third", 0),
            ],
        );

        let table = records.get(test).unwrap().table("measurements").unwrap();
        assert!(table.is_consistent());
        assert_eq!(table.headers(), &["Meas 1", "Meas 2", "Third"]);
        assert_eq!(table.row(0).unwrap().measured(), &["1.0", "", ""]);
        assert_eq!(table.row(1).unwrap().measured(), &["", "", "2.1"]);
    }

    #[test]
    fn test_tolerance_fields() {
        let mut records = RecordSet::new();
        let test = TestKind::AccuracyOfIrradiationTime;
        route_fields(
            &mut records,
            &[
                field(test, "Tolerance_Operator", "<", 0),
                field(test, "Tolerance_Sign", "+", 0),
                field(test, "Tolerance_Type", "absolute", 0),
                field(test, "Tolerance_Value", "0.05", 0),
            ],
        );
        let spec = records.get(test).unwrap().tolerance;
        assert_eq!(spec.operator, Operator::Less);
        assert_eq!(spec.sign, Sign::Plus);
        assert_eq!(spec.kind, ToleranceType::Absolute);
        assert_eq!(spec.value, Some(0.05));
    }

    #[test]
    fn test_bad_tolerance_text() {
        let mut records = RecordSet::new();
        let test = TestKind::AccuracyOfIrradiationTime;
        route_fields(
            &mut records,
            &[
                field(test, "Tolerance_Operator", "about", 0),
                field(test, "Tolerance_Value", "ten", 0),
            ],
        );
        let spec = records.get(test).unwrap().tolerance;
        assert_eq!(spec.operator, Operator::LessOrEqual);
        assert_eq!(spec.value, None);
    }

    #[test]
    fn test_unknown_suffix_is_ignored() {
        let mut records = RecordSet::new();
        let summary = route_fields(
            &mut records,
            &[field(TestKind::AccuracyOfOperatingPotential, "Table2_Colour", "red", 0)],
        );
        assert_eq!(summary.routed, 0);
        assert_eq!(summary.ignored, 1);
        assert!(records.is_empty());
    }
}
