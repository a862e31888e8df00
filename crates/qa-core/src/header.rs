//! Header locator for Field Name / Value / Row Index layouts

use crate::source::RawRow;
use serde::{Deserialize, Serialize};

/// Column positions used by the sectioned parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Index of the "Field Name" column
    pub field_name: usize,
    /// Index of the "Value" column
    pub value: usize,
    /// Index of the "Row Index" column, if present
    pub row_index: Option<usize>,
    /// Index of an optional per-row "Test Name" column
    pub test_name: Option<usize>,
    /// First row after the header (0 when no header was found)
    pub data_start: usize,
}

impl Default for ColumnLayout {
    /// Positional fallback: columns 0/1/2, data from the first row
    fn default() -> Self {
        Self {
            field_name: 0,
            value: 1,
            row_index: Some(2),
            test_name: None,
            data_start: 0,
        }
    }
}

impl ColumnLayout {
    /// True when the layout came from a real header row
    pub fn has_header(&self) -> bool {
        self.data_start > 0
    }
}

/// Scan the first `scan_rows` rows for a header, falling back to columns 0/1/2
pub fn locate_header(rows: &[RawRow], scan_rows: usize) -> ColumnLayout {
    for (row_idx, row) in rows.iter().take(scan_rows).enumerate() {
        let find = |label: &str| {
            row.iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(label))
        };

        if let (Some(field_name), Some(value)) = (find("field name"), find("value")) {
            return ColumnLayout {
                field_name,
                value,
                row_index: find("row index"),
                test_name: find("test name"),
                data_start: row_idx + 1,
            };
        }
    }

    ColumnLayout::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<RawRow> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_header_in_first_row() {
        let rows = rows(&[&["Field Name", "Value", "Row Index"], &["Table2_SetKV", "80", "0"]]);
        let layout = locate_header(&rows, 10);

        assert_eq!(layout.field_name, 0);
        assert_eq!(layout.value, 1);
        assert_eq!(layout.row_index, Some(2));
        assert_eq!(layout.test_name, None);
        assert_eq!(layout.data_start, 1);
        assert!(layout.has_header());
    }

    #[test]
    fn test_header_after_title_rows_reordered() {
        let rows = rows(&[
            &["QA export", "", ""],
            &[""],
            &["row index", " VALUE ", "Test Name", "field name"],
        ]);
        let layout = locate_header(&rows, 10);

        assert_eq!(layout.field_name, 3);
        assert_eq!(layout.value, 1);
        assert_eq!(layout.row_index, Some(0));
        assert_eq!(layout.test_name, Some(2));
        assert_eq!(layout.data_start, 3);
    }

    #[test]
    fn test_header_without_row_index() {
        let rows = rows(&[&["Field Name", "Value"]]);
        let layout = locate_header(&rows, 10);
        assert_eq!(layout.row_index, None);
    }

    #[test]
    fn test_fallback_when_no_header() {
        let rows = rows(&[&["Table2_SetKV", "80", "0"]]);
        let layout = locate_header(&rows, 10);
        assert_eq!(layout, ColumnLayout::default());
        assert!(!layout.has_header());
    }

    #[test]
    fn test_header_beyond_scan_window_is_ignored() {
        let rows = rows(&[&["a"], &["b"], &["Field Name", "Value"]]);
        assert_eq!(locate_header(&rows, 2), ColumnLayout::default());
        assert_eq!(locate_header(&rows, 3).data_start, 3);
    }
}
