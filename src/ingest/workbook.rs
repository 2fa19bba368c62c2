//! Spreadsheet tracking exports (xlsx, xls, ods)
//!
//! Only the first worksheet is read and its first row is the header.

use super::{Cell, RawTable};
use crate::error::{Error, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

pub fn read(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(Error::EmptyWorkbook)??;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|d| d.to_string()).collect(),
        None => return Ok(RawTable::default()),
    };

    let mut table = RawTable::new(columns);
    for row in rows {
        table.rows.push(row.iter().map(to_cell).collect());
    }
    Ok(table)
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}
