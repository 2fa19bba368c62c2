//! Per-subject, per-action summary statistics
//!
//! Filtered detections are grouped by (subject, action). Each group reports
//! how many frames it covers, the span of time between its first and last
//! frame, and its share of all filtered frames.

use crate::dataset::Detection;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One (subject, action) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub subject_id: i64,
    pub action: String,
    pub frame_count: usize,
    /// Last minus first elapsed time within the group.
    pub duration_seconds: f64,
    /// Share of all filtered frames, rounded to 2 decimals.
    pub percentage: f64,
}

/// Aggregation over one filtered set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Ordered by subject id, then action.
    pub rows: Vec<SummaryRow>,
    pub total_frames: usize,
    pub subjects: usize,
    pub actions: usize,
}

/// Round half to even at two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

impl Summary {
    pub fn from_detections(detections: &[&Detection]) -> Self {
        // (count, min elapsed, max elapsed)
        let mut groups: BTreeMap<(i64, &str), (usize, f64, f64)> = BTreeMap::new();

        for d in detections {
            let entry = groups
                .entry((d.subject_id, d.action.as_str()))
                .or_insert((0, f64::INFINITY, f64::NEG_INFINITY));
            entry.0 += 1;
            entry.1 = entry.1.min(d.elapsed_seconds);
            entry.2 = entry.2.max(d.elapsed_seconds);
        }

        let total_frames = detections.len();
        let rows: Vec<SummaryRow> = groups
            .into_iter()
            .map(|((subject_id, action), (count, first, last))| SummaryRow {
                subject_id,
                action: action.to_string(),
                frame_count: count,
                duration_seconds: last - first,
                percentage: round2(count as f64 / total_frames as f64 * 100.0),
            })
            .collect();

        let subjects: BTreeSet<i64> = rows.iter().map(|r| r.subject_id).collect();
        let actions: BTreeSet<&str> = rows.iter().map(|r| r.action.as_str()).collect();

        Self {
            subjects: subjects.len(),
            actions: actions.len(),
            rows,
            total_frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Frame counts summed per action across subjects, in action order.
    pub fn frames_per_action(&self) -> BTreeMap<&str, usize> {
        let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
        for r in &self.rows {
            *totals.entry(r.action.as_str()).or_default() += r.frame_count;
        }
        totals
    }

    pub fn percentage_total(&self) -> f64 {
        self.rows.iter().map(|r| r.percentage).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{BoundingBox, FrameRate};
    use proptest::prelude::*;

    fn detection(frame: i64, id: i64, action: &str) -> Detection {
        Detection {
            frame,
            subject_id: id,
            bbox: BoundingBox { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0 },
            action: action.to_string(),
            elapsed_seconds: FrameRate::default().seconds(frame),
            extra: vec![],
        }
    }

    // ==========================================================================
    // GROUPING
    // ==========================================================================

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_detections(&[]);
        assert!(summary.is_empty());
        assert_eq!(summary.total_frames, 0);
        assert_eq!(summary.subjects, 0);
        assert_eq!(summary.percentage_total(), 0.0);
    }

    #[test]
    fn test_single_group() {
        let a = detection(0, 1, "Pie");
        let b = detection(25, 1, "Pie");
        let summary = Summary::from_detections(&[&a, &b]);

        assert_eq!(
            summary.rows,
            vec![SummaryRow {
                subject_id: 1,
                action: "Pie".to_string(),
                frame_count: 2,
                duration_seconds: 1.0,
                percentage: 100.0,
            }]
        );
    }

    #[test]
    fn test_rows_ordered_by_subject_then_action() {
        let ds = [
            detection(0, 2, "Pie"),
            detection(1, 1, "Pie"),
            detection(2, 1, "Comiendo"),
            detection(3, 2, "Echada"),
        ];
        let refs: Vec<&Detection> = ds.iter().collect();
        let summary = Summary::from_detections(&refs);

        let keys: Vec<(i64, &str)> = summary.rows.iter().map(|r| (r.subject_id, r.action.as_str())).collect();
        assert_eq!(keys, vec![(1, "Comiendo"), (1, "Pie"), (2, "Echada"), (2, "Pie")]);
        assert_eq!(summary.subjects, 2);
        assert_eq!(summary.actions, 3);
    }

    #[test]
    fn test_duration_is_span_not_sum() {
        // Frames 0, 100 and 50: span is 100 frames regardless of order or gaps
        let ds = [detection(0, 1, "Pie"), detection(100, 1, "Pie"), detection(50, 1, "Pie")];
        let refs: Vec<&Detection> = ds.iter().collect();
        let summary = Summary::from_detections(&refs);
        assert_eq!(summary.rows[0].duration_seconds, 4.0);
    }

    #[test]
    fn test_single_frame_group_has_zero_duration() {
        let d = detection(40, 3, "Echada");
        let summary = Summary::from_detections(&[&d]);
        assert_eq!(summary.rows[0].duration_seconds, 0.0);
    }

    #[test]
    fn test_percentages_are_rounded() {
        let ds = [detection(0, 1, "Pie"), detection(1, 2, "Pie"), detection(2, 3, "Pie")];
        let refs: Vec<&Detection> = ds.iter().collect();
        let summary = Summary::from_detections(&refs);
        for r in &summary.rows {
            assert_eq!(r.percentage, 33.33);
        }
    }

    #[test]
    fn test_frames_per_action() {
        let ds = [detection(0, 1, "Pie"), detection(1, 2, "Pie"), detection(2, 1, "Comiendo")];
        let refs: Vec<&Detection> = ds.iter().collect();
        let summary = Summary::from_detections(&refs);
        let totals: Vec<(&str, usize)> = summary.frames_per_action().into_iter().collect();
        assert_eq!(totals, vec![("Comiendo", 1), ("Pie", 2)]);
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }

    // ==========================================================================
    // PROPERTIES
    // ==========================================================================

    proptest! {
        #[test]
        fn prop_percentages_sum_to_100(rows in prop::collection::vec((0i64..5, 0usize..4, 0i64..2000), 1..200)) {
            let labels = ["Pie", "Echada", "Comiendo", "Caminando"];
            let ds: Vec<Detection> = rows
                .iter()
                .map(|&(id, a, frame)| detection(frame, id, labels[a]))
                .collect();
            let refs: Vec<&Detection> = ds.iter().collect();
            let summary = Summary::from_detections(&refs);

            // Each row is off by at most half a unit in the last place kept
            let tolerance = 0.005 * summary.rows.len() as f64 + 1e-9;
            prop_assert!((summary.percentage_total() - 100.0).abs() <= tolerance);
            prop_assert_eq!(summary.rows.iter().map(|r| r.frame_count).sum::<usize>(), ds.len());
        }

        #[test]
        fn prop_durations_are_non_negative(rows in prop::collection::vec((0i64..3, 0i64..500), 0..100)) {
            let ds: Vec<Detection> = rows.iter().map(|&(id, f)| detection(f, id, "Pie")).collect();
            let refs: Vec<&Detection> = ds.iter().collect();
            for r in Summary::from_detections(&refs).rows {
                prop_assert!(r.duration_seconds >= 0.0);
            }
        }
    }
}
