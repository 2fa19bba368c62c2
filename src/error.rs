//! Error types for herdscope.

use thiserror::Error;

/// Result type for herdscope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A tracking table that lacks one or more required columns.
///
/// Returned by [`crate::schema::validate`]. A table that fails this check is
/// rejected as a whole; nothing downstream runs for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "the file does not have the expected tracking columns (missing: {})",
    missing.join(", ")
)]
pub struct SchemaError {
    /// Required columns absent after normalization, in canonical order.
    pub missing: Vec<String>,
    /// Normalized column names that were present.
    pub found: Vec<String>,
}

/// Error type for herdscope operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// File extension is neither delimited text nor a spreadsheet.
    #[error("unsupported file type '{0}' (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    /// Required columns missing.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A cell could not be coerced to the type its column requires.
    #[error("row {row}, column '{column}': {message}")]
    TypeConversion {
        /// 1-based data row number (header excluded).
        row: usize,
        column: String,
        message: String,
    },

    /// Frame rate must be a positive integer.
    #[error("invalid frame rate {0}: must be a positive integer")]
    InvalidFrameRate(i64),

    /// The workbook contains no worksheet to read.
    #[error("workbook has no worksheets")]
    EmptyWorkbook,

    /// Delimited text parse error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet parse error.
    #[error("spreadsheet error: {0}")]
    Workbook(#[from] calamine::Error),

    /// Spreadsheet export error.
    #[error("export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a type conversion error for a data row.
    pub fn conversion(row: usize, column: &str, message: impl Into<String>) -> Self {
        Error::TypeConversion {
            row,
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// True for errors caused by the file's columns rather than its contents.
    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_missing_columns() {
        let err = SchemaError {
            missing: vec!["x2".to_string(), "accion".to_string()],
            found: vec!["frame".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("x2, accion"), "message was: {}", msg);
    }

    #[test]
    fn test_schema_error_is_transparent() {
        let schema = SchemaError {
            missing: vec!["id".to_string()],
            found: vec![],
        };
        let err: Error = schema.clone().into();
        assert!(err.is_schema());
        assert_eq!(err.to_string(), schema.to_string());
    }

    #[test]
    fn test_conversion_error_names_row_and_column() {
        let err = Error::conversion(4, "id", "expected an integer, got 'vaca'");
        assert!(!err.is_schema());
        assert_eq!(err.to_string(), "row 4, column 'id': expected an integer, got 'vaca'");
    }
}
