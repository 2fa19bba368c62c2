//! Row selection by subject, action and frame range
//!
//! The three criteria are independent and combine with AND. Each defaults to
//! everything observed in the dataset, so an untouched [`FilterSelection`]
//! keeps every row.

use crate::dataset::{Dataset, Detection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive frame interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub min: i64,
    pub max: i64,
}

impl FrameRange {
    /// Build a range, swapping the bounds if given in reverse.
    pub fn new(a: i64, b: i64) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    pub fn contains(&self, frame: i64) -> bool {
        self.min <= frame && frame <= self.max
    }
}

/// Everything a user can pick from, as observed in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Sorted distinct subject ids.
    pub subject_ids: Vec<i64>,
    /// Sorted distinct (capitalized) action labels.
    pub actions: Vec<String>,
    /// Observed frame bounds; `None` for an empty dataset.
    pub frames: Option<FrameRange>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let ids: BTreeSet<i64> = dataset.detections.iter().map(|d| d.subject_id).collect();
        let actions: BTreeSet<&str> = dataset.detections.iter().map(|d| d.action.as_str()).collect();
        let min = dataset.detections.iter().map(|d| d.frame).min();
        let max = dataset.detections.iter().map(|d| d.frame).max();

        Self {
            subject_ids: ids.into_iter().collect(),
            actions: actions.into_iter().map(str::to_string).collect(),
            frames: min.zip(max).map(|(lo, hi)| FrameRange::new(lo, hi)),
        }
    }
}

/// The user's current choice of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSelection {
    pub subject_ids: BTreeSet<i64>,
    pub actions: BTreeSet<String>,
    pub frames: FrameRange,
}

impl FilterSelection {
    /// Select everything in `options`.
    pub fn all(options: &FilterOptions) -> Self {
        Self {
            subject_ids: options.subject_ids.iter().copied().collect(),
            actions: options.actions.iter().cloned().collect(),
            frames: options.frames.unwrap_or(FrameRange { min: 0, max: 0 }),
        }
    }

    /// Start from [`FilterSelection::all`] and override what `params` sets.
    ///
    /// An explicitly empty id or action list selects nothing; an absent one
    /// keeps the default.
    pub fn from_params(options: &FilterOptions, params: &FilterParams) -> Self {
        let mut selection = Self::all(options);
        if let Some(ids) = &params.ids {
            selection.subject_ids = ids.iter().copied().collect();
        }
        if let Some(actions) = &params.actions {
            selection.actions = actions.iter().cloned().collect();
        }
        let (lo, hi) = (
            params.frame_min.unwrap_or(selection.frames.min),
            params.frame_max.unwrap_or(selection.frames.max),
        );
        selection.frames = FrameRange::new(lo, hi);
        selection
    }

    pub fn matches(&self, d: &Detection) -> bool {
        self.subject_ids.contains(&d.subject_id)
            && self.actions.contains(&d.action)
            && self.frames.contains(d.frame)
    }

    /// Detections passing all three criteria, in input order.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Vec<&'a Detection> {
        dataset.detections.iter().filter(|d| self.matches(d)).collect()
    }
}

/// Partial selection as it arrives from the UI or the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    pub ids: Option<Vec<i64>>,
    pub actions: Option<Vec<String>>,
    pub frame_min: Option<i64>,
    pub frame_max: Option<i64>,
}

impl FilterParams {
    /// Parse a comma-separated id list. Blank input is an empty list;
    /// entries that are not integers are ignored.
    pub fn parse_ids(list: &str) -> Vec<i64> {
        split_list(list).filter_map(|s| s.parse().ok()).collect()
    }

    /// Parse a comma-separated action list, capitalizing each label so it
    /// matches the dataset's normalized actions.
    pub fn parse_actions(list: &str) -> Vec<String> {
        split_list(list).map(crate::dataset::capitalize).collect()
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}
