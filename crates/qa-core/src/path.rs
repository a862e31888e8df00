//! Field paths: typed destinations decoded from import field names
//!
//! A field name such as `Table2_Meas3` is split into a prefix (`Table2`) and a
//! suffix (`Meas3`), and then resolved against the test's layout into one
//! [`FieldPath`] variant. Names the layout does not describe are rejected here,
//! so the router only ever sees destinations that exist.

use crate::catalog::{ColumnFamily, RouteTarget, TestLayout};
use crate::table::{MAX_COLUMNS, MAX_ROWS};
use thiserror::Error;

/// Suffix token addressing a collection's column headers (`Table2_Header3`)
pub const HEADER_TOKEN: &str = "Header";

/// Prefix shared by every test for its tolerance bundle
pub const TOLERANCE_PREFIX: &str = "Tolerance";

/// Part of the tolerance bundle a field addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceField {
    Operator,
    Sign,
    Type,
    Value,
}

impl ToleranceField {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "operator" => Some(ToleranceField::Operator),
            "sign" => Some(ToleranceField::Sign),
            "type" => Some(ToleranceField::Type),
            "value" => Some(ToleranceField::Value),
            _ => None,
        }
    }
}

/// Resolved destination of one import field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// Record-level scalar
    Scalar { key: String },
    /// Named cell of a row
    Cell {
        collection: &'static str,
        row: usize,
        key: String,
    },
    /// Measurement column of a row (0-based)
    Measured {
        collection: &'static str,
        family: ColumnFamilyRef,
        row: usize,
        column: usize,
    },
    /// Column header of a collection (0-based)
    Header {
        collection: &'static str,
        family: ColumnFamilyRef,
        column: usize,
    },
    /// Part of the tolerance bundle
    Tolerance(ToleranceField),
}

/// Column family of a path, compared by token
#[derive(Debug, Clone, Copy)]
pub struct ColumnFamilyRef(pub ColumnFamily);

impl PartialEq for ColumnFamilyRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.token == other.0.token
    }
}

impl Eq for ColumnFamilyRef {}

/// Why a field name has no destination in a test
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("field name '{0}' has no prefix")]
    MissingPrefix(String),
    #[error("prefix '{prefix}' is not used by this test")]
    UnknownPrefix { prefix: String },
    #[error("unknown field '{suffix}' under prefix '{prefix}'")]
    UnknownSuffix { prefix: String, suffix: String },
    #[error("row {row} is past the last allowed row ({max})")]
    RowOutOfRange { row: usize, max: usize },
    #[error("column {column} is past the last allowed column ({max})")]
    ColumnOutOfRange { column: usize, max: usize },
}

/// Split `Prefix_Suffix` at the first underscore
pub fn split_field_name(field_name: &str) -> Option<(&str, &str)> {
    let (prefix, suffix) = field_name.trim().split_once('_')?;
    if prefix.is_empty() || suffix.is_empty() {
        return None;
    }
    Some((prefix, suffix))
}

/// Decode `<token><digits>` into a 0-based column; digits are 1-based
pub fn column_index(suffix: &str, token: &str) -> Option<usize> {
    if suffix.len() <= token.len() || !suffix.is_char_boundary(token.len()) {
        return None;
    }
    let (head, digits) = suffix.split_at(token.len());
    if !head.eq_ignore_ascii_case(token) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok()?.checked_sub(1)
}

fn check_row(row: usize) -> Result<(), PathError> {
    if row >= MAX_ROWS {
        return Err(PathError::RowOutOfRange { row, max: MAX_ROWS - 1 });
    }
    Ok(())
}

fn check_column(column: usize) -> Result<(), PathError> {
    if column >= MAX_COLUMNS {
        return Err(PathError::ColumnOutOfRange {
            column,
            max: MAX_COLUMNS - 1,
        });
    }
    Ok(())
}

/// Editor key for a suffix: `SetKV` → `setKV`, `FCD` → `fcd`, `kV` → `kV`
pub fn camel_key(suffix: &str) -> String {
    let chars: Vec<char> = suffix.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_ascii_uppercase()).count();

    let lower_count = match upper_run {
        0 => 0,
        n if n == chars.len() => n,
        1 => 1,
        // "HVLmm": keep the last capital with the word it starts
        n if chars[n].is_ascii_lowercase() => n - 1,
        n => n,
    };

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < lower_count { c.to_ascii_lowercase() } else { *c })
        .collect()
}

impl FieldPath {
    /// Resolve a field name against a test layout
    pub fn resolve(layout: &TestLayout, field_name: &str, row: usize) -> Result<FieldPath, PathError> {
        let (prefix, suffix) =
            split_field_name(field_name).ok_or_else(|| PathError::MissingPrefix(field_name.to_string()))?;

        let unknown_suffix = || PathError::UnknownSuffix {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        };

        if prefix.eq_ignore_ascii_case(TOLERANCE_PREFIX) {
            return ToleranceField::from_suffix(suffix)
                .map(FieldPath::Tolerance)
                .ok_or_else(unknown_suffix);
        }

        let route = layout.route(prefix).ok_or_else(|| PathError::UnknownPrefix {
            prefix: prefix.to_string(),
        })?;

        match &route.target {
            RouteTarget::Scalars(keys) => keys
                .iter()
                .find(|k| k.eq_ignore_ascii_case(suffix))
                .map(|k| FieldPath::Scalar { key: camel_key(k) })
                .ok_or_else(unknown_suffix),
            RouteTarget::Collection(collection) => {
                if let Some(key) = collection.cell(suffix) {
                    check_row(row)?;
                    return Ok(FieldPath::Cell {
                        collection: collection.name,
                        row,
                        key: camel_key(key),
                    });
                }

                let family = collection.family.ok_or_else(unknown_suffix)?;
                if let Some(column) = column_index(suffix, family.token) {
                    check_row(row)?;
                    check_column(column)?;
                    return Ok(FieldPath::Measured {
                        collection: collection.name,
                        family: ColumnFamilyRef(family),
                        row,
                        column,
                    });
                }
                if let Some(column) = column_index(suffix, HEADER_TOKEN) {
                    check_column(column)?;
                    return Ok(FieldPath::Header {
                        collection: collection.name,
                        family: ColumnFamilyRef(family),
                        column,
                    });
                }
                Err(unknown_suffix())
            }
        }
    }
}
