//! Resolution-bucketed activity grid for stacked timeline charts
//!
//! The session is cut into buckets of `resolution` seconds. A category is
//! marked active in every bucket touched by one of its operations, from
//! `floor(start / resolution)` through `floor(end / resolution)` inclusive.

use crate::category::OperationCategory;
use crate::error::{InstrumentationError, Result};
use crate::ledger::LedgerSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Largest grid `build` will allocate, per row
pub const MAX_TIME_POINTS: usize = 1_000_000;

/// Activity grid keyed by category wire name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedTimeline {
    /// Bucket start times in seconds: `0, r, 2r, …`
    pub time_points: Vec<f64>,
    /// Per category, one flag per time point
    pub categories: BTreeMap<String, Vec<bool>>,
}

impl StackedTimeline {
    /// Build the grid from a live session snapshot
    pub fn from_snapshot(snapshot: &LedgerSnapshot, resolution: Duration) -> Result<Self> {
        Self::build(
            snapshot.session_duration.as_secs_f64(),
            resolution.as_secs_f64(),
            OperationCategory::ALL.iter().map(|c| c.as_str().to_string()),
            snapshot.completed.iter().filter_map(|record| {
                record.end_offset.map(|end| {
                    (
                        record.category.as_str().to_string(),
                        record.start_offset.as_secs_f64(),
                        end.as_secs_f64(),
                    )
                })
            }),
        )
    }

    /// Build the grid from raw `(category, start, end)` spans in seconds
    ///
    /// Every name in `categories` gets a row even if it has no spans; spans of
    /// categories outside that list get a row of their own. With no spans or a
    /// zero-length session the grid has no time points.
    pub fn build<C, S>(
        session_duration_secs: f64,
        resolution_secs: f64,
        categories: C,
        spans: S,
    ) -> Result<Self>
    where
        C: IntoIterator<Item = String>,
        S: IntoIterator<Item = (String, f64, f64)>,
    {
        if !resolution_secs.is_finite() || resolution_secs <= 0.0 {
            return Err(InstrumentationError::Config(format!(
                "stacked timeline resolution must be a positive number of seconds, got {}",
                resolution_secs
            )));
        }

        let spans: Vec<(String, f64, f64)> = spans.into_iter().collect();
        let session_duration_secs = session_duration_secs.max(0.0);

        if spans.is_empty() || session_duration_secs == 0.0 {
            return Ok(Self {
                time_points: Vec::new(),
                categories: categories.into_iter().map(|c| (c, Vec::new())).collect(),
            });
        }

        let num_points = point_count(session_duration_secs, resolution_secs)?;
        let time_points: Vec<f64> = (0..num_points)
            .map(|i| i as f64 * resolution_secs)
            .collect();

        let mut rows: BTreeMap<String, Vec<bool>> = categories
            .into_iter()
            .map(|c| (c, vec![false; num_points]))
            .collect();

        for (category, start, end) in spans {
            let first = bucket_index(start, resolution_secs);
            let last = bucket_index(end.max(start), resolution_secs).min(num_points - 1);
            let row = rows
                .entry(category)
                .or_insert_with(|| vec![false; num_points]);
            for flag in row.iter_mut().take(last + 1).skip(first) {
                *flag = true;
            }
        }

        Ok(Self {
            time_points,
            categories: rows,
        })
    }

    /// Number of buckets in which `category` was active
    pub fn active_buckets(&self, category: &str) -> usize {
        self.categories
            .get(category)
            .map(|row| row.iter().filter(|active| **active).count())
            .unwrap_or(0)
    }
}

/// `floor(session / resolution) + 1`, bounded by [`MAX_TIME_POINTS`]
fn point_count(session_duration_secs: f64, resolution_secs: f64) -> Result<usize> {
    let buckets = (session_duration_secs / resolution_secs).floor();
    if !buckets.is_finite() || buckets >= MAX_TIME_POINTS as f64 {
        return Err(InstrumentationError::Config(format!(
            "stacked timeline of {}s at {}s resolution exceeds {} time points",
            session_duration_secs, resolution_secs, MAX_TIME_POINTS
        )));
    }
    Ok(buckets as usize + 1)
}

fn bucket_index(offset_secs: f64, resolution_secs: f64) -> usize {
    if offset_secs.is_finite() && offset_secs > 0.0 {
        (offset_secs / resolution_secs) as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_names() -> Vec<String> {
        OperationCategory::ALL
            .iter()
            .map(|c| c.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_marks_inclusive_bucket_range() {
        let grid = StackedTimeline::build(
            4.0,
            1.0,
            all_names(),
            vec![("llm_calls".to_string(), 1.5, 2.5)],
        )
        .unwrap();

        assert_eq!(grid.time_points, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            grid.categories["llm_calls"],
            vec![false, true, true, false, false]
        );
        assert_eq!(grid.active_buckets("database_calls"), 0);
    }

    #[test]
    fn test_end_beyond_session_is_clipped() {
        let grid = StackedTimeline::build(
            2.0,
            1.0,
            all_names(),
            vec![("database_calls".to_string(), 1.0, 9.0)],
        )
        .unwrap();
        assert_eq!(grid.categories["database_calls"], vec![false, true, true]);
    }

    #[test]
    fn test_empty_spans_give_empty_grid_with_all_rows() {
        let grid = StackedTimeline::build(10.0, 0.5, all_names(), Vec::new()).unwrap();
        assert!(grid.time_points.is_empty());
        assert_eq!(grid.categories.len(), OperationCategory::ALL.len());
        assert!(grid.categories.values().all(|row| row.is_empty()));
    }

    #[test]
    fn test_unknown_category_gets_own_row() {
        let grid = StackedTimeline::build(
            1.0,
            0.5,
            all_names(),
            vec![("reranker_calls".to_string(), 0.0, 0.4)],
        )
        .unwrap();
        assert_eq!(grid.categories["reranker_calls"], vec![true, false, false]);
    }

    #[test]
    fn test_non_positive_resolution_rejected() {
        for resolution in [0.0, -1.0, f64::NAN] {
            let err = StackedTimeline::build(1.0, resolution, all_names(), Vec::new()).unwrap_err();
            assert!(matches!(err, InstrumentationError::Config(_)));
        }
    }

    #[test]
    fn test_unbounded_session_rejected() {
        let spans = || vec![("llm_calls".to_string(), 0.0, 1.0)];
        for session in [1e300, f64::INFINITY] {
            let err = StackedTimeline::build(session, 0.1, all_names(), spans()).unwrap_err();
            assert!(matches!(err, InstrumentationError::Config(_)));
        }
    }

    #[test]
    fn test_too_fine_resolution_rejected() {
        let err = StackedTimeline::build(
            20.0,
            1e-9,
            all_names(),
            vec![("llm_calls".to_string(), 0.0, 1.0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("time points"));
    }

    #[test]
    fn test_grid_at_point_limit_is_built() {
        let grid = StackedTimeline::build(
            (MAX_TIME_POINTS - 1) as f64,
            1.0,
            vec!["llm_calls".to_string()],
            vec![("llm_calls".to_string(), 0.0, 1.0)],
        )
        .unwrap();
        assert_eq!(grid.time_points.len(), MAX_TIME_POINTS);
    }
}
