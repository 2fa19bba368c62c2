//! Tracking table column schema
//!
//! The tracker's export names its columns in Spanish and with no fixed
//! casing or order. Names are trimmed and lower-cased before the required set
//! is checked; extra columns are allowed and carried through.

use crate::error::SchemaError;
use crate::ingest::RawTable;
use std::collections::HashSet;
use tracing::warn;

pub const FRAME: &str = "frame";
pub const ID: &str = "id";
pub const X1: &str = "x1";
pub const Y1: &str = "y1";
pub const X2: &str = "x2";
pub const Y2: &str = "y2";
pub const ACTION: &str = "accion";

/// Derived column written on export.
pub const ELAPSED: &str = "tiempo_seg";

/// Columns every tracking export must carry, in export order.
pub const REQUIRED_COLUMNS: [&str; 7] = [FRAME, ID, X1, Y1, X2, Y2, ACTION];

/// Positions of the required columns within a normalized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub frame: usize,
    pub id: usize,
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
    pub action: usize,
}

impl ColumnMap {
    pub fn required(&self) -> [usize; 7] {
        [self.frame, self.id, self.x1, self.y1, self.x2, self.y2, self.action]
    }

    fn is_required(&self, index: usize) -> bool {
        self.required().contains(&index)
    }
}

/// A table whose columns are normalized and known to include the required set.
#[derive(Debug, Clone)]
pub struct ValidatedTable {
    pub table: RawTable,
    pub columns: ColumnMap,
}

impl ValidatedTable {
    /// Indices of the non-required columns, in input order.
    ///
    /// A stale `tiempo_seg` from a previous export is left out; it is derived
    /// again from the frame column.
    pub fn extra_columns(&self) -> Vec<usize> {
        (0..self.table.columns.len())
            .filter(|&i| !self.columns.is_required(i) && self.table.columns[i] != ELAPSED)
            .collect()
    }
}

/// Trim and lower-case a column name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize every column name in place.
pub fn normalize_columns(table: &mut RawTable) {
    for name in table.columns.iter_mut() {
        *name = normalize_name(name);
    }
}

/// Give later columns that share a name a numeric suffix (`conf`, `conf_2`).
///
/// The first occurrence keeps its name, so it is the one matched as a
/// required column.
pub fn rename_duplicates(table: &mut RawTable) {
    let mut seen: HashSet<String> = HashSet::new();
    for i in 0..table.columns.len() {
        let name = table.columns[i].clone();
        if seen.insert(name.clone()) {
            continue;
        }
        let mut n = 2;
        let renamed = loop {
            let candidate = format!("{}_{}", name, n);
            if !seen.contains(&candidate) && !table.columns.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        warn!(column = %name, renamed = %renamed, "duplicate column renamed");
        seen.insert(renamed.clone());
        table.columns[i] = renamed;
    }
}

/// Normalize column names and check the required set is present.
///
/// When two columns normalize to the same name the first one wins and the
/// others are kept under suffixed names.
pub fn validate(mut table: RawTable) -> Result<ValidatedTable, SchemaError> {
    normalize_columns(&mut table);
    rename_duplicates(&mut table);

    let position = |name: &str| table.columns.iter().position(|c| c == name);
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| position(*name).is_none())
        .map(|name| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(SchemaError {
            missing,
            found: table.columns.clone(),
        });
    }

    let index = |name: &str| position(name).unwrap_or_default();
    let columns = ColumnMap {
        frame: index(FRAME),
        id: index(ID),
        x1: index(X1),
        y1: index(Y1),
        x2: index(X2),
        y2: index(Y2),
        action: index(ACTION),
    };

    Ok(ValidatedTable { table, columns })
}
