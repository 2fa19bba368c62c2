//! Typed detections derived from a validated tracking table
//!
//! Each input row becomes a [`Detection`]: the frame index, the tracked
//! subject, its bounding box, and the action label the detector assigned.
//! Derivation does three things to the raw values:
//!
//! 1. **Action labels are capitalized** ("pie", "PIE" and "Pie" all become
//!    "Pie") so case differences don't split one action into several.
//! 2. **Ids and frames are coerced to integers.** `3.0` is accepted, `3.5`
//!    and `"vaca"` are not.
//! 3. **Elapsed seconds** are computed as `frame / frame_rate` and recomputed
//!    whenever the frame rate changes.
//!
//! Rows that cannot be coerced either fail the whole load
//! ([`RowPolicy::Strict`], the default) or are dropped ([`RowPolicy::Skip`]).

use crate::error::{Error, Result};
use crate::ingest::Cell;
use crate::schema::{self, ValidatedTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Video frame rate, frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameRate(NonZeroU32);

impl FrameRate {
    pub const DEFAULT_FPS: u32 = 25;

    pub fn new(fps: i64) -> Result<Self> {
        u32::try_from(fps)
            .ok()
            .and_then(NonZeroU32::new)
            .map(FrameRate)
            .ok_or(Error::InvalidFrameRate(fps))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Seconds into the video at which `frame` was captured.
    pub fn seconds(self, frame: i64) -> f64 {
        frame as f64 / self.get() as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate(NonZeroU32::MIN.saturating_add(Self::DEFAULT_FPS - 1))
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fps", self.get())
    }
}

impl FromStr for FrameRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fps: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidFrameRate(0))?;
        FrameRate::new(fps)
    }
}

/// What to do with a row whose values cannot be coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowPolicy {
    /// Reject the whole table on the first bad row.
    #[default]
    Strict,
    /// Drop bad rows and keep going.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One detection of one subject in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub frame: i64,
    pub subject_id: i64,
    pub bbox: BoundingBox,
    /// Capitalized action label.
    pub action: String,
    pub elapsed_seconds: f64,
    /// Values of [`Dataset::extra_columns`], in the same order.
    pub extra: Vec<Cell>,
}

/// All detections from one tracking file.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Name of the uploaded file.
    pub source: String,
    /// Non-required input columns, carried through to the table and export.
    pub extra_columns: Vec<String>,
    pub detections: Vec<Detection>,
    /// Number of rows dropped under [`RowPolicy::Skip`].
    pub skipped_rows: usize,
    frame_rate: FrameRate,
}

/// Uppercase the first character and lowercase the rest.
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl Dataset {
    /// Derive typed detections from a validated table.
    pub fn derive(
        source: impl Into<String>,
        validated: &ValidatedTable,
        frame_rate: FrameRate,
        policy: RowPolicy,
    ) -> Result<Self> {
        let table = &validated.table;
        let extras = validated.extra_columns();

        let mut detections = Vec::with_capacity(table.len());
        let mut skipped_rows = 0;

        for row in 0..table.len() {
            match derive_row(validated, row, &extras, frame_rate) {
                Ok(detection) => detections.push(detection),
                Err(e) => match policy {
                    RowPolicy::Strict => return Err(e),
                    RowPolicy::Skip => {
                        tracing::warn!(error = %e, "skipping row");
                        skipped_rows += 1;
                    }
                },
            }
        }

        Ok(Self {
            source: source.into(),
            extra_columns: extras.iter().map(|&i| table.columns[i].clone()).collect(),
            detections,
            skipped_rows,
            frame_rate,
        })
    }

    /// Assemble a dataset from detections built elsewhere.
    ///
    /// Elapsed times are recomputed from `frame_rate`.
    pub fn from_detections(
        source: impl Into<String>,
        detections: Vec<Detection>,
        frame_rate: FrameRate,
    ) -> Self {
        let mut detections = detections;
        for d in detections.iter_mut() {
            d.elapsed_seconds = frame_rate.seconds(d.frame);
        }
        Self {
            source: source.into(),
            extra_columns: Vec::new(),
            detections,
            skipped_rows: 0,
            frame_rate,
        }
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    /// Change the frame rate and recompute every elapsed time.
    pub fn set_frame_rate(&mut self, frame_rate: FrameRate) {
        if frame_rate == self.frame_rate {
            return;
        }
        self.frame_rate = frame_rate;
        for d in self.detections.iter_mut() {
            d.elapsed_seconds = frame_rate.seconds(d.frame);
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Column names of the detection table as shown and exported.
    pub fn table_columns(&self) -> Vec<String> {
        schema::REQUIRED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.extra_columns.iter().cloned())
            .chain(std::iter::once(schema::ELAPSED.to_string()))
            .collect()
    }

    /// One detection as cells aligned with [`Dataset::table_columns`].
    pub fn row_cells(&self, d: &Detection) -> Vec<Cell> {
        let mut cells = vec![
            Cell::Int(d.frame),
            Cell::Int(d.subject_id),
            Cell::Float(d.bbox.x1),
            Cell::Float(d.bbox.y1),
            Cell::Float(d.bbox.x2),
            Cell::Float(d.bbox.y2),
            Cell::Text(d.action.clone()),
        ];
        cells.extend(d.extra.iter().cloned());
        cells.push(Cell::Float(d.elapsed_seconds));
        cells
    }
}

fn derive_row(
    validated: &ValidatedTable,
    row: usize,
    extras: &[usize],
    frame_rate: FrameRate,
) -> Result<Detection> {
    let table = &validated.table;
    let cols = &validated.columns;
    // 1-based, matching what a spreadsheet user sees below the header
    let line = row + 1;

    let integer = |col: usize, name: &str| -> Result<i64> {
        let cell = table.cell(row, col);
        cell.as_i64()
            .ok_or_else(|| Error::conversion(line, name, format!("expected an integer, got '{}'", cell)))
    };
    let number = |col: usize, name: &str| -> Result<f64> {
        let cell = table.cell(row, col);
        cell.as_f64()
            .ok_or_else(|| Error::conversion(line, name, format!("expected a number, got '{}'", cell)))
    };

    let frame = integer(cols.frame, schema::FRAME)?;
    if frame < 0 {
        return Err(Error::conversion(line, schema::FRAME, format!("frame must not be negative, got {}", frame)));
    }

    Ok(Detection {
        frame,
        subject_id: integer(cols.id, schema::ID)?,
        bbox: BoundingBox {
            x1: number(cols.x1, schema::X1)?,
            y1: number(cols.y1, schema::Y1)?,
            x2: number(cols.x2, schema::X2)?,
            y2: number(cols.y2, schema::Y2)?,
        },
        action: capitalize(&table.cell(row, cols.action).to_string()),
        elapsed_seconds: frame_rate.seconds(frame),
        extra: extras.iter().map(|&i| table.cell(row, i).clone()).collect(),
    })
}
