//! Readers turning CSV or Excel uploads into raw text rows
//!
//! Every upload becomes a `Vec<RawRow>`: one entry per spreadsheet row, one
//! string per cell, in file order. No trimming or interpretation happens here;
//! that is the job of the header locator and the sectioned parser.

use crate::error::{Error, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// One spreadsheet row as cell strings
pub type RawRow = Vec<String>;

/// Extensions accepted for upload, lowercase
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "txt", "xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Container format of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Delimited text
    Csv,
    /// Any workbook calamine can open
    Excel,
}

impl SourceFormat {
    /// Detect the format from a file name's extension
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceFormat::Excel),
            _ => Err(Error::UnsupportedFileType(name.to_string())),
        }
    }
}

/// Read an upload from disk
pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_bytes(&path.to_string_lossy(), &bytes)
}

/// Read an upload from its bytes, using `name` for format detection
pub fn read_bytes(name: &str, bytes: &[u8]) -> Result<Vec<RawRow>> {
    let format = SourceFormat::from_name(name)?;

    if bytes.is_empty() {
        return Err(Error::EmptyFile(name.to_string()));
    }

    let rows = match format {
        SourceFormat::Csv => read_csv_str(&String::from_utf8_lossy(bytes), name)?,
        SourceFormat::Excel => read_excel(name, bytes)?,
    };

    if rows.iter().all(|row| row.iter().all(|c| c.trim().is_empty())) {
        return Err(Error::EmptyFile(name.to_string()));
    }

    Ok(rows)
}

/// Parse delimited text into rows (useful for testing)
pub fn read_csv_str(content: &str, name: &str) -> Result<Vec<RawRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = sniff_delimiter(content);

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Section rows are often shorter than data rows
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            name: name.to_string(),
            source: e,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(rows)
}

/// Pick the delimiter that occurs most often outside quotes on the first line
fn sniff_delimiter(content: &str) -> u8 {
    const CANDIDATES: [u8; 3] = [b',', b';', b'\t'];

    let Some(line) = content.lines().find(|l| !l.trim().is_empty()) else {
        return b',';
    };

    let mut counts = [0usize; CANDIDATES.len()];
    let mut in_quotes = false;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = CANDIDATES.iter().position(|&c| c == byte) {
            counts[i] += 1;
        }
    }

    // Ties go to the comma, which comes first
    let mut best = 0;
    for i in 1..CANDIDATES.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    CANDIDATES[best]
}

/// Read the first worksheet of a workbook
fn read_excel(name: &str, bytes: &[u8]) -> Result<Vec<RawRow>> {
    let excel_err = |message: String| Error::Excel {
        name: name.to_string(),
        message,
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| excel_err(e.to_string()))?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::NoSheets(name.to_string()))?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| excel_err(e.to_string()))?;

    // calamine ranges start at the first used cell, not at A1
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<RawRow> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row.iter().map(render_cell));
        rows.push(cells);
    }

    Ok(rows)
}

/// Render a workbook cell the way it would appear in an exported CSV
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // f64 Display already drops a trailing ".0"
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
