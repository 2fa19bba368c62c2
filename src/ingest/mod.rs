//! Reading tracking exports into an untyped table
//!
//! The tracker writes either comma-delimited text or a spreadsheet. Both end
//! up as a [`RawTable`]: the header row as column names plus rows of typed
//! [`Cell`]s. No column checks happen here; see [`crate::schema`].
//!
//! ```ignore
//! let table = ingest::load(&bytes, "tracking_vacas.csv")?;
//! let table = ingest::load_path("exports/run3.xlsx")?;
//! ```

pub mod delimited;
pub mod workbook;

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Extensions routed to the spreadsheet reader.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Every extension [`load`] accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xlsm", "xls", "ods"];

/// One raw input value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Type a delimited-text field: integer, then float, then text.
    pub fn infer(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else if let Ok(i) = trimmed.parse::<i64>() {
            Cell::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            Cell::Float(f)
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric value, parsing text if needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Empty => None,
        }
    }

    /// Integer value. Floats qualify only when they carry no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) => integral(*f),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
            Cell::Empty => None,
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Column names and rows exactly as read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column), `Empty` when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Cell::Empty)
    }
}

/// Lower-cased extension of a file name, or an empty string.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// True if `file_name` carries an extension [`load`] can read.
pub fn is_supported(file_name: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(file_name).as_str())
}

/// Parse an uploaded file, picking the reader from its declared name.
pub fn load(bytes: &[u8], file_name: &str) -> Result<RawTable> {
    let ext = extension_of(file_name);
    match ext.as_str() {
        "csv" => delimited::read(bytes),
        e if SPREADSHEET_EXTENSIONS.contains(&e) => workbook::read(bytes),
        _ => Err(Error::UnsupportedFormat(file_name.to_string())),
    }
}

/// Read and parse a file from disk.
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    load(&bytes, &path.to_string_lossy())
}
