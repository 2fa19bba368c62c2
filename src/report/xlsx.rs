//! Spreadsheet export of the filtered detection table
//!
//! The workbook is built entirely in memory. It holds the filtered rows (not
//! the summary) with the input columns plus `tiempo_seg`, one sheet, header
//! in the first row.

use crate::dashboard::DashboardView;
use crate::error::Result;
use crate::ingest::Cell;
use rust_xlsxwriter::{Format, Workbook};

/// Download name offered by the dashboard.
pub const EXPORT_FILE_NAME: &str = "analisis_vacas_filtrado.xlsx";

pub const MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Serialize the view's filtered table to xlsx bytes.
pub fn to_bytes(view: &DashboardView) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1")?;

    let header = Format::new().set_bold();
    for (col, name) in view.columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &header)?;
    }

    for (i, cells) in view.rows.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, cell) in cells.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Int(n) => {
                    sheet.write_number(row, col, *n as f64)?;
                }
                Cell::Float(f) => {
                    sheet.write_number(row, col, *f)?;
                }
                Cell::Text(s) => {
                    sheet.write_string(row, col, s)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
