//! Comma-delimited tracking exports

use super::{Cell, RawTable};
use crate::error::Result;
use csv::ReaderBuilder;

/// Parse CSV bytes. The first record is the header row.
pub fn read(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = RawTable::new(columns);

    for record in reader.records() {
        let record = record?;
        table.rows.push(record.iter().map(Cell::infer).collect());
    }

    Ok(table)
}
