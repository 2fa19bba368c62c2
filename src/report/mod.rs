//! Report generation for dashboard views
//!
//! This module writes a [`DashboardView`] out in several formats:
//!
//! - **HTML**: Self-contained dashboard page with D3.js charts
//! - **JSON**: The full view, machine-readable
//! - **CSV**: The summary table, for spreadsheets and scripts
//! - **XLSX**: The filtered detection table (the dashboard's export)
//!
//! # Usage
//!
//! ```ignore
//! use herdscope::report;
//!
//! // Automatically picks format based on extension
//! report::generate("corral.html", &view)?;  // HTML
//! report::generate("corral.json", &view)?;  // JSON
//! report::generate("corral.csv", &view)?;   // CSV
//! report::generate("corral.xlsx", &view)?;  // XLSX
//! ```

pub mod csv;
pub mod html;
pub mod json;
pub mod xlsx;

use crate::dashboard::DashboardView;
use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Report formats, chosen from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Json,
    Csv,
    Xlsx,
}

impl Format {
    /// Format for an extension; anything unknown falls back to HTML.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Format::Json,
            "csv" => Format::Csv,
            "xlsx" => Format::Xlsx,
            _ => Format::Html,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Xlsx => "xlsx",
        }
    }
}

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, view: &DashboardView) -> Result<()> {
    let path = path.as_ref();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let mut file = std::fs::File::create(path)?;
    write(&mut file, view, Format::from_extension(ext))
}

/// Write a report in `format` to any writer.
pub fn write<W: Write>(writer: &mut W, view: &DashboardView, format: Format) -> Result<()> {
    match format {
        Format::Html => html::write(writer, view),
        Format::Json => json::write(writer, view),
        Format::Csv => csv::write(writer, view),
        Format::Xlsx => {
            let bytes = xlsx::to_bytes(view)?;
            writer.write_all(&bytes)?;
            Ok(())
        }
    }
}
