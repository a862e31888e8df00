//! Sectioned record parser for Field Name / Value / Row Index exports

use crate::catalog::{is_known_prefix, TestKind};
use crate::error::Result;
use crate::header::{locate_header, ColumnLayout};
use crate::normalize::{normalize_test_name, section_label};
use crate::path::split_field_name;
use crate::source::{read_csv_str, RawRow};
use crate::table::MAX_ROWS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One field row of an export, tagged with the test it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportField {
    pub field_name: String,
    pub value: String,
    /// Logical row within the test's row collection
    pub row_index: usize,
    pub test: TestKind,
}

impl ImportField {
    /// Create a new import field
    pub fn new(field_name: impl Into<String>, value: impl Into<String>, row_index: usize, test: TestKind) -> Self {
        Self {
            field_name: field_name.into(),
            value: value.into(),
            row_index,
            test,
        }
    }
}

/// Options controlling how rows are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Rows scanned for the header
    pub header_scan_rows: usize,
    /// Treat a repeated row-start value as the same logical row
    pub merge_repeated_row_start: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            header_scan_rows: 10,
            merge_repeated_row_start: true,
        }
    }
}

/// Parsed fields plus what was skipped along the way
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseOutput {
    pub fields: Vec<ImportField>,
    pub layout: Option<ColumnLayout>,
    /// Rows after the header
    pub rows_read: usize,
    /// Section markers that resolved to a test
    pub sections: usize,
    /// Labels of section markers that matched no test
    pub unresolved_sections: Vec<String>,
    /// Blank, comment or unknown-prefix rows
    pub skipped_rows: usize,
    /// Valid field rows seen while no test was active
    pub dropped_without_test: usize,
}

/// Row grouping state of one test
#[derive(Debug, Default)]
struct RowCounter {
    current: usize,
    last_row_start: Option<String>,
}

impl RowCounter {
    /// Register a row-start value and return the row it belongs to
    fn row_start(&mut self, value: &str, merge_repeated: bool) -> usize {
        match &self.last_row_start {
            // First row of the section stays at 0
            None => {}
            Some(last) if merge_repeated && last == value => {}
            Some(_) => self.current += 1,
        }
        self.last_row_start = Some(value.to_string());
        self.current
    }
}

/// Parse rows that have not had their header located yet
pub fn parse_rows(rows: &[RawRow], options: &ParseOptions) -> ParseOutput {
    let layout = locate_header(rows, options.header_scan_rows);
    parse_with_layout(rows, layout, options)
}

/// Parse delimited text (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str, options: &ParseOptions) -> Result<ParseOutput> {
    let rows = read_csv_str(content, source_name)?;
    Ok(parse_rows(&rows, options))
}

/// Walk the data rows with known column positions
pub fn parse_with_layout(rows: &[RawRow], layout: ColumnLayout, options: &ParseOptions) -> ParseOutput {
    let mut output = ParseOutput {
        layout: Some(layout),
        ..ParseOutput::default()
    };

    let mut current: Option<TestKind> = None;
    let mut counters: HashMap<TestKind, RowCounter> = HashMap::new();

    let cell = |row: &RawRow, idx: usize| -> String { row.get(idx).map(|c| c.trim().to_string()).unwrap_or_default() };

    for (offset, row) in rows.iter().skip(layout.data_start).enumerate() {
        let line = layout.data_start + offset + 1;
        output.rows_read += 1;

        let field_name = cell(row, layout.field_name);

        // Section markers may sit in the Field Name column or in the first cell
        let marker = section_label(&field_name)
            .map(str::to_string)
            .or_else(|| section_label(&cell(row, 0)).map(str::to_string));
        if let Some(label) = marker {
            current = normalize_test_name(&label);
            match current {
                Some(test) => {
                    debug!(line, %label, test = test.slug(), "section");
                    counters.insert(test, RowCounter::default());
                    output.sections += 1;
                }
                None => {
                    warn!(line, %label, "unrecognized section, skipping its fields");
                    output.unresolved_sections.push(label);
                }
            }
            continue;
        }

        if field_name.is_empty() || field_name.starts_with("---") {
            output.skipped_rows += 1;
            continue;
        }

        let Some((prefix, _)) = split_field_name(&field_name) else {
            output.skipped_rows += 1;
            continue;
        };
        if !is_known_prefix(prefix) {
            output.skipped_rows += 1;
            continue;
        }

        if let Some(idx) = layout.test_name {
            let raw = cell(row, idx);
            if !raw.is_empty() {
                current = normalize_test_name(&raw);
                if current.is_none() {
                    warn!(line, test_name = %raw, "unrecognized test name");
                }
            }
        }

        let Some(test) = current else {
            debug!(line, field = %field_name, "dropping field outside any known test");
            output.dropped_without_test += 1;
            continue;
        };

        let value = cell(row, layout.value);
        let counter = counters.entry(test).or_default();
        let counted_row = if test.layout().is_row_start(&field_name) {
            counter.row_start(&value, options.merge_repeated_row_start)
        } else {
            counter.current
        };

        let row_index = match layout.row_index.map(|idx| cell(row, idx)) {
            Some(raw) if !raw.is_empty() => match raw.parse::<usize>() {
                Ok(explicit) if explicit < MAX_ROWS => explicit,
                Ok(_) => {
                    warn!(line, row_index = %raw, "row index past the row limit, using counter");
                    counted_row
                }
                Err(_) => {
                    debug!(line, row_index = %raw, "invalid row index, using counter");
                    counted_row
                }
            },
            _ => counted_row,
        };

        output.fields.push(ImportField::new(field_name, value, row_index, test));
    }

    output
}
