//! One rendering pass of the dashboard
//!
//! [`render`] takes a dataset and a filter selection and returns everything
//! the page shows: filter options, the filtered table, the summary and the
//! chart data. It is pure; the caller decides when to call it again (file
//! upload, filter change, frame-rate change).

use crate::chart::Charts;
use crate::dataset::Dataset;
use crate::filter::{FilterOptions, FilterParams, FilterSelection};
use crate::ingest::Cell;
use crate::summary::Summary;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Name of the file the view was computed from.
    pub source: String,
    pub frame_rate: u32,
    pub options: FilterOptions,
    pub selection: FilterSelection,
    /// Header of the filtered table.
    pub columns: Vec<String>,
    /// Filtered rows, aligned with `columns`.
    pub rows: Vec<Vec<Cell>>,
    pub summary: Summary,
    pub charts: Charts,
}

impl DashboardView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Compute the full view for `selection`.
pub fn render(dataset: &Dataset, selection: &FilterSelection) -> DashboardView {
    let filtered = selection.apply(dataset);
    let summary = Summary::from_detections(&filtered);
    let charts = Charts::build(&filtered, &summary);

    tracing::debug!(
        source = %dataset.source,
        total = dataset.len(),
        filtered = filtered.len(),
        groups = summary.rows.len(),
        "rendered"
    );

    DashboardView {
        source: dataset.source.clone(),
        frame_rate: dataset.frame_rate().get(),
        options: FilterOptions::from_dataset(dataset),
        selection: selection.clone(),
        columns: dataset.table_columns(),
        rows: filtered.iter().map(|d| dataset.row_cells(d)).collect(),
        summary,
        charts,
    }
}

/// Resolve `params` against the dataset's options, then [`render`].
pub fn render_with(dataset: &Dataset, params: &FilterParams) -> DashboardView {
    let options = FilterOptions::from_dataset(dataset);
    render(dataset, &FilterSelection::from_params(&options, params))
}
