//! Columnar table model shared by every test editor
//!
//! A [`TestRecord`] holds record-level scalar fields, one [`RowCollection`]
//! per table of the test, and the test's tolerance. Collections with a
//! variable-width measurement family keep `headers.len()` equal to every
//! row's `measured.len()`; the only way to change either is through the
//! collection's methods, which resize both together.

use crate::catalog::TestKind;
use crate::error::Error;
use crate::tolerance::{Remark, ToleranceSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Rows an upload may address in one collection
pub const MAX_ROWS: usize = 10_000;

/// Measurement columns an upload may address in one collection
pub const MAX_COLUMNS: usize = 1_000;

/// A row of one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Named cells (e.g. `setKV`, `remarks`)
    pub cells: BTreeMap<String, String>,
    /// Measurement values, one per header of the owning collection
    #[serde(rename = "measuredValues")]
    measured: Vec<String>,
}

impl Row {
    fn with_width(width: usize) -> Self {
        Self {
            cells: BTreeMap::new(),
            measured: vec![String::new(); width],
        }
    }

    /// Get a named cell
    pub fn cell(&self, key: &str) -> Option<&str> {
        self.cells.get(key).map(String::as_str)
    }

    /// Set a named cell, replacing any previous value
    pub fn set_cell(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(key.into(), value.into());
    }

    /// Measurement values in header order
    pub fn measured(&self) -> &[String] {
        &self.measured
    }

    /// True when no cell and no measurement holds a value
    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty()) && self.measured.iter().all(|v| v.trim().is_empty())
    }
}

/// Serialized form, validated on the way in
#[derive(Deserialize)]
struct CollectionData {
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<CollectionData> for RowCollection {
    type Error = Error;

    fn try_from(data: CollectionData) -> Result<Self, Self::Error> {
        for (i, row) in data.rows.iter().enumerate() {
            if row.measured.len() != data.headers.len() {
                return Err(Error::InvalidRecord(format!(
                    "row {} has {} measured values but the collection has {} headers",
                    i,
                    row.measured.len(),
                    data.headers.len()
                )));
            }
        }
        Ok(Self {
            headers: data.headers,
            rows: data.rows,
        })
    }
}

/// Rows of one table plus the headers of its measurement columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CollectionData")]
pub struct RowCollection {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl RowCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with the given measurement headers
    pub fn with_headers(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Mutable rows; row widths stay fixed through this view
    pub fn rows_mut(&mut self) -> std::slice::IterMut<'_, Row> {
        self.rows.iter_mut()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of measurement columns
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Mutable access to a row, growing the collection with blank rows until
    /// `index` exists
    pub fn row_mut(&mut self, index: usize) -> &mut Row {
        let width = self.headers.len();
        if self.rows.len() <= index {
            self.rows.resize_with(index + 1, || Row::with_width(width));
        }
        &mut self.rows[index]
    }

    /// Append a blank row and return its index
    pub fn add_row(&mut self) -> usize {
        self.rows.push(Row::with_width(self.headers.len()));
        self.rows.len() - 1
    }

    /// Remove a row, shifting later rows up
    pub fn remove_row(&mut self, index: usize) -> Option<Row> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    /// Append a measurement column to the headers and to every row
    pub fn add_column(&mut self, header: impl Into<String>) -> usize {
        self.headers.push(header.into());
        for row in &mut self.rows {
            row.measured.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Remove a measurement column from the headers and from every row
    pub fn remove_column(&mut self, index: usize) -> Option<String> {
        if index >= self.headers.len() {
            return None;
        }
        for row in &mut self.rows {
            row.measured.remove(index);
        }
        Some(self.headers.remove(index))
    }

    /// Rename an existing column
    pub fn rename_column(&mut self, index: usize, header: impl Into<String>) -> bool {
        match self.headers.get_mut(index) {
            Some(h) => {
                *h = header.into();
                true
            }
            None => false,
        }
    }

    /// Grow to at least `count` columns, naming new ones with `default_header`
    pub fn ensure_columns(&mut self, count: usize, default_header: impl Fn(usize) -> String) {
        while self.headers.len() < count {
            let next = self.headers.len();
            self.add_column(default_header(next));
        }
    }

    /// Set a named cell on a row, growing rows as needed
    pub fn set_cell(&mut self, row: usize, key: impl Into<String>, value: impl Into<String>) {
        self.row_mut(row).set_cell(key, value);
    }

    /// Set a measurement value, growing rows and columns as needed
    pub fn set_measured(
        &mut self,
        row: usize,
        column: usize,
        value: impl Into<String>,
        default_header: impl Fn(usize) -> String,
    ) {
        self.ensure_columns(column + 1, default_header);
        self.row_mut(row).measured[column] = value.into();
    }

    /// Set a header, growing columns as needed
    pub fn set_header(&mut self, column: usize, header: impl Into<String>, default_header: impl Fn(usize) -> String) {
        self.ensure_columns(column + 1, default_header);
        self.headers[column] = header.into();
    }

    /// Check the header/row width invariant
    pub fn is_consistent(&self) -> bool {
        self.rows.iter().all(|r| r.measured.len() == self.headers.len())
    }
}

/// One test's editable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test: TestKind,
    /// Record-level scalar fields
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Row collections keyed by collection name
    #[serde(default)]
    pub tables: BTreeMap<String, RowCollection>,
    pub tolerance: ToleranceSpec,
    /// Overall remark, recomputed by the evaluator
    #[serde(default)]
    pub remark: Remark,
}

impl TestRecord {
    /// Create an empty record with the test's collections and default tolerance
    pub fn new(test: TestKind) -> Self {
        let layout = test.layout();
        let tables = layout
            .collections()
            .map(|c| (c.name.to_string(), RowCollection::new()))
            .collect();

        Self {
            test,
            fields: BTreeMap::new(),
            tables,
            tolerance: layout.default_tolerance,
            remark: Remark::NotApplicable,
        }
    }

    /// Get a scalar field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Set a scalar field
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Remove a scalar field
    pub fn remove_field(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    /// Find a collection by name
    pub fn table(&self, name: &str) -> Option<&RowCollection> {
        self.tables.get(name)
    }

    /// Collection by name, created empty if missing
    pub fn table_mut(&mut self, name: &str) -> &mut RowCollection {
        self.tables.entry(name.to_string()).or_default()
    }

    /// True when no field and no row has been filled
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.tables.values().all(|t| t.row_count() == 0)
    }

    /// Flatten into the JSON shape the editors keep as state
    ///
    /// Scalars sit at the top level, every collection becomes an array of
    /// row objects (cells plus `measuredValues`), collections with columns
    /// also get a `<name>Headers` array.
    pub fn to_editor_json(&self) -> Value {
        let mut root = Map::new();
        root.insert("testName".to_string(), Value::from(self.test.canonical_name()));

        for (key, value) in &self.fields {
            root.insert(key.clone(), Value::from(value.as_str()));
        }

        for (name, table) in &self.tables {
            let rows: Vec<Value> = table
                .rows()
                .iter()
                .map(|row| {
                    let mut obj: Map<String, Value> = row
                        .cells
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                        .collect();
                    if table.column_count() > 0 {
                        obj.insert(
                            "measuredValues".to_string(),
                            Value::from(row.measured().to_vec()),
                        );
                    }
                    Value::Object(obj)
                })
                .collect();

            root.insert(name.clone(), Value::Array(rows));
            if table.column_count() > 0 {
                root.insert(format!("{}Headers", name), Value::from(table.headers().to_vec()));
            }
        }

        root.insert(
            "tolerance".to_string(),
            serde_json::to_value(self.tolerance).unwrap_or(Value::Null),
        );
        root.insert("remark".to_string(), Value::from(self.remark.as_str()));

        Value::Object(root)
    }
}

/// The records of one service (one report), one per test kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: BTreeMap<TestKind, TestRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, test: TestKind) -> Option<&TestRecord> {
        self.records.get(&test)
    }

    /// Record for a test, created empty on first use
    pub fn get_or_create(&mut self, test: TestKind) -> &mut TestRecord {
        self.records.entry(test).or_insert_with(|| TestRecord::new(test))
    }

    /// Insert or replace a record
    pub fn insert(&mut self, record: TestRecord) {
        self.records.insert(record.test, record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TestRecord> {
        self.records.values_mut()
    }

    pub fn tests(&self) -> Vec<TestKind> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meas(i: usize) -> String {
        format!("Meas {}", i + 1)
    }

    #[test]
    fn test_row_mut_grows_on_demand() {
        let mut table = RowCollection::with_headers(vec!["Meas 1".into(), "Meas 2".into()]);
        table.set_cell(2, "setKV", "80");

        assert_eq!(table.row_count(), 3);
        assert!(table.row(0).unwrap().is_blank());
        assert_eq!(table.row(2).unwrap().cell("setKV"), Some("80"));
        assert!(table.rows().iter().all(|r| r.measured().len() == 2));
    }

    #[test]
    fn test_set_measured_grows_columns_for_every_row() {
        let mut table = RowCollection::new();
        table.add_row();
        table.set_measured(1, 2, "5.1", meas);

        assert_eq!(table.headers(), &["Meas 1", "Meas 2", "Meas 3"]);
        assert_eq!(table.row(0).unwrap().measured(), &["", "", ""]);
        assert_eq!(table.row(1).unwrap().measured(), &["", "", "5.1"]);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_add_and_remove_column_keep_invariant() {
        let mut table = RowCollection::new();
        table.set_measured(0, 1, "a", meas);
        table.set_measured(1, 0, "b", meas);

        let idx = table.add_column("Extra");
        assert_eq!(idx, 2);
        assert!(table.is_consistent());
        assert_eq!(table.row(0).unwrap().measured().len(), 3);

        assert_eq!(table.remove_column(0), Some("Meas 1".to_string()));
        assert!(table.is_consistent());
        assert_eq!(table.row(0).unwrap().measured(), &["a", ""]);
        assert_eq!(table.row(1).unwrap().measured(), &["", ""]);

        assert_eq!(table.remove_column(9), None);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_new_rows_match_header_width() {
        let mut table = RowCollection::new();
        table.add_column("Meas 1");
        let idx = table.add_row();
        assert_eq!(table.row(idx).unwrap().measured().len(), 1);
        assert_eq!(table.remove_row(idx).map(|r| r.measured().len()), Some(1));
        assert!(table.remove_row(5).is_none());
    }

    #[test]
    fn test_rename_and_set_header() {
        let mut table = RowCollection::new();
        assert!(!table.rename_column(0, "x"));
        table.set_header(1, "100 mA", meas);
        assert_eq!(table.headers(), &["Meas 1", "100 mA"]);
        assert!(table.rename_column(0, "50 mA"));
        assert_eq!(table.headers()[0], "50 mA");
    }

    #[test]
    fn test_deserialize_rejects_mismatched_rows() {
        let json = r#"{"headers":["Meas 1"],"rows":[{"cells":{},"measuredValues":["1","2"]}]}"#;
        assert!(serde_json::from_str::<RowCollection>(json).is_err());

        let json = r#"{"headers":["Meas 1"],"rows":[{"cells":{"kV":"80"},"measuredValues":["1"]}]}"#;
        let table: RowCollection = serde_json::from_str(json).unwrap();
        assert_eq!(table.row(0).unwrap().cell("kV"), Some("80"));
    }

    #[test]
    fn test_record_new_has_layout_collections() {
        let record = TestRecord::new(TestKind::LinearityOfMaLoading);
        assert!(record.table("table1").is_some());
        assert!(record.table("measurements").is_some());
        assert!(record.is_empty());
        assert_eq!(record.tolerance.value, Some(0.1));
    }

    #[test]
    fn test_editor_json_shape() {
        let mut record = TestRecord::new(TestKind::ConsistencyOfRadiationOutput);
        record.set_field("fcd", "100");
        let rows = record.table_mut("outputRows");
        rows.set_cell(0, "kV", "80");
        rows.set_measured(0, 1, "5.1", meas);

        let json = record.to_editor_json();
        assert_eq!(json["testName"], "Consistency of Radiation Output");
        assert_eq!(json["fcd"], "100");
        assert_eq!(json["outputRows"][0]["kV"], "80");
        assert_eq!(json["outputRows"][0]["measuredValues"][1], "5.1");
        assert_eq!(json["outputRowsHeaders"][0], "Meas 1");
        assert_eq!(json["tolerance"]["operator"], "<=");
        assert_eq!(json["remark"], "-");
    }

    #[test]
    fn test_record_set_round_trip_keys() {
        let mut set = RecordSet::new();
        set.get_or_create(TestKind::TotalFiltration).set_field("appliedKV", "80");
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("total_filtration").is_some());

        let back: RecordSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}
