//! Herdscope - Explore animal-tracking detections
//!
//! Herdscope reads the per-frame output of a video tracker (one row per
//! detected animal per frame) and turns it into a filterable dashboard:
//! the raw table, a per-subject/per-action summary, three charts, and a
//! spreadsheet export of the filtered rows.
//!
//! # Overview
//!
//! A tracking file is a CSV or Excel sheet with at least these columns
//! (header names are matched case-insensitively after trimming):
//!
//! | Column | Meaning |
//! |--------|---------|
//! | `frame` | Video frame index |
//! | `id` | Tracked subject identifier |
//! | `x1`, `y1`, `x2`, `y2` | Bounding box corners |
//! | `accion` | Behavior label (`pie`, `comiendo`, ...) |
//!
//! Loading a file validates those columns, capitalizes action labels, and
//! derives `tiempo_seg = frame / fps`. Everything after that is a pure
//! function of the loaded dataset and a filter selection.
//!
//! # Quick Start
//!
//! ```no_run
//! use herdscope::{render_with, FilterParams, Pipeline};
//!
//! let dataset = Pipeline::new().load_path("tracking_vacas.csv")?;
//! let params = FilterParams {
//!     ids: Some(vec![1]),
//!     ..Default::default()
//! };
//! let view = render_with(&dataset, &params);
//!
//! for row in &view.summary.rows {
//!     println!(
//!         "{} {:<10} {:>6} frames {:>8.2}s {:>6.2}%",
//!         row.subject_id, row.action, row.frame_count, row.duration_seconds, row.percentage
//!     );
//! }
//! # Ok::<(), herdscope::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`ingest`]: CSV and workbook readers producing a raw table
//! - [`schema`]: Column normalization and validation
//! - [`dataset`]: Typed detections with derived fields
//! - [`filter`]: Filter options and selections
//! - [`summary`]: Per-subject, per-action aggregation
//! - [`chart`]: Chart series for the bar, pie, and timeline views
//! - [`dashboard`]: The pure `render` step combining the above
//! - [`report`]: Output formatters (HTML, JSON, CSV, XLSX)
//! - [`serve`]: Interactive single-session HTTP dashboard

pub mod chart;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod serve;
pub mod summary;

pub use dashboard::{render, render_with, DashboardView};
pub use dataset::{Dataset, Detection, FrameRate, RowPolicy};
pub use error::{Error, Result, SchemaError};
pub use filter::{FilterOptions, FilterParams, FilterSelection};
pub use pipeline::Pipeline;
pub use summary::{Summary, SummaryRow};
