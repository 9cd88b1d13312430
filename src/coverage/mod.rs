// Timeline Coverage Engine
//
// Objective: measure how much wall-clock time was *occupied* by a category,
// as opposed to how much work it did. Three overlapping 100s calls in a 100s
// session represent 300s of work but only 100s of occupancy.
//
// Algorithm: interval union.
//   1. collect [start, end] of every completed operation
//   2. sort by start, ties by end
//   3. sweep once, extending the current merged interval while the next one
//      starts at or before its end (overlapping or touching)
//   4. sum the lengths of the merged intervals
//
// O(n log n) per call, recomputed from a ledger snapshot on every request.
// Nothing is maintained incrementally.

pub mod stacked;

use crate::category::OperationCategory;
use crate::ledger::LedgerSnapshot;
use std::time::Duration;

pub use stacked::StackedTimeline;

/// Closed time interval `[start, end]`, as offsets from session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: Duration,
    pub end: Duration,
}

impl Interval {
    /// Create an interval; an `end` before `start` collapses to an empty interval at `start`
    pub fn new(start: Duration, end: Duration) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

/// Merge overlapping or touching intervals into a sorted, disjoint set
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_unstable_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for next in intervals {
        match merged.last_mut() {
            Some(current) if next.start <= current.end => {
                current.end = current.end.max(next.end);
            }
            _ => merged.push(next),
        }
    }
    merged
}

/// Total time covered by at least one interval
pub fn covered_duration<I>(intervals: I) -> Duration
where
    I: IntoIterator<Item = Interval>,
{
    merge_intervals(intervals.into_iter().collect())
        .iter()
        .map(Interval::length)
        .sum()
}

/// Time during which at least one operation of `category` was active
pub fn category_coverage(snapshot: &LedgerSnapshot, category: OperationCategory) -> Duration {
    covered_duration(
        snapshot
            .records_in(category)
            .filter_map(|record| record.interval()),
    )
}

/// Time during which any tracked operation was active, regardless of category
pub fn overall_coverage(snapshot: &LedgerSnapshot) -> Duration {
    covered_duration(
        snapshot
            .completed
            .iter()
            .filter_map(|record| record.interval()),
    )
}
