//! Chart data for the dashboard
//!
//! Charts are drawn by D3 in the browser; this module decides what they show.
//! Everything here is a read-only projection of the filtered rows and their
//! summary.
//!
//! - **Bar**: frames per action, one bar per subject within each action group.
//! - **Pie**: frames per action across all subjects.
//! - **Timeline**: each subject's action over elapsed time, points in time order.

use crate::dataset::Detection;
use crate::summary::{round2, Summary};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPoint {
    pub action: String,
    pub frame_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub subject_id: i64,
    pub points: Vec<BarPoint>,
}

/// Grouped bar chart: x = action, y = frame count, one series per subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarChart {
    /// Action groups along the x axis, sorted.
    pub actions: Vec<String>,
    pub series: Vec<BarSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub action: String,
    pub frame_count: usize,
    /// Percent of all frames, rounded to 2 decimals.
    pub share: f64,
}

/// Pie chart: one slice per action, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PieChart {
    pub slices: Vec<PieSlice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub elapsed_seconds: f64,
    pub frame: i64,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSeries {
    pub subject_id: i64,
    pub points: Vec<TimelinePoint>,
}

/// Line chart: x = elapsed seconds, y = action category, one line per subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    /// Category axis, sorted.
    pub actions: Vec<String>,
    pub series: Vec<TimelineSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Charts {
    pub bar: BarChart,
    pub pie: PieChart,
    pub timeline: Timeline,
}

impl BarChart {
    pub fn from_summary(summary: &Summary) -> Self {
        let actions: BTreeSet<&str> = summary.rows.iter().map(|r| r.action.as_str()).collect();
        let mut series: BTreeMap<i64, Vec<BarPoint>> = BTreeMap::new();
        for r in &summary.rows {
            series.entry(r.subject_id).or_default().push(BarPoint {
                action: r.action.clone(),
                frame_count: r.frame_count,
            });
        }

        Self {
            actions: actions.into_iter().map(str::to_string).collect(),
            series: series
                .into_iter()
                .map(|(subject_id, points)| BarSeries { subject_id, points })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl PieChart {
    pub fn from_summary(summary: &Summary) -> Self {
        let totals = summary.frames_per_action();
        let all: usize = totals.values().sum();

        let mut slices: Vec<PieSlice> = totals
            .into_iter()
            .map(|(action, frame_count)| PieSlice {
                action: action.to_string(),
                frame_count,
                share: round2(frame_count as f64 / all as f64 * 100.0),
            })
            .collect();
        // Stable sort keeps alphabetical order among equal counts
        slices.sort_by(|a, b| b.frame_count.cmp(&a.frame_count));

        Self { slices }
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

impl Timeline {
    pub fn from_detections(detections: &[&Detection]) -> Self {
        let actions: BTreeSet<&str> = detections.iter().map(|d| d.action.as_str()).collect();
        let mut series: BTreeMap<i64, Vec<TimelinePoint>> = BTreeMap::new();
        for d in detections {
            series.entry(d.subject_id).or_default().push(TimelinePoint {
                elapsed_seconds: d.elapsed_seconds,
                frame: d.frame,
                action: d.action.clone(),
            });
        }

        Self {
            actions: actions.into_iter().map(str::to_string).collect(),
            series: series
                .into_iter()
                .map(|(subject_id, mut points)| {
                    points.sort_by(|a, b| {
                        a.elapsed_seconds
                            .total_cmp(&b.elapsed_seconds)
                            .then(a.frame.cmp(&b.frame))
                    });
                    TimelineSeries { subject_id, points }
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl Charts {
    pub fn build(detections: &[&Detection], summary: &Summary) -> Self {
        Self {
            bar: BarChart::from_summary(summary),
            pie: PieChart::from_summary(summary),
            timeline: Timeline::from_detections(detections),
        }
    }
}
