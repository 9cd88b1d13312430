//! Per-category summary statistics
//!
//! Computed on demand from a [`LedgerSnapshot`]; nothing here is maintained
//! incrementally. Two percentages are reported per category:
//!
//! - **cumulative**: sum of durations / session duration. Measures work volume
//!   and exceeds 100% when operations of the category run in parallel.
//!   It is never clamped.
//! - **timeline coverage**: union of intervals / session duration. Measures
//!   wall-clock occupancy and stays within `[0, 100]`.

use crate::category::OperationCategory;
use crate::coverage;
use crate::error::{InstrumentationError, Result};
use crate::ledger::{LedgerSnapshot, OperationRecord};
use std::collections::BTreeMap;
use std::time::Duration;

/// Statistics for one category over its completed operations
///
/// Timing fields are zero when `count == 0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySummary {
    pub count: usize,
    pub total_time: Duration,
    pub min_time: Duration,
    pub max_time: Duration,
    pub average_time: Duration,
    /// Wall-clock time with at least one operation of this category active
    pub covered_time: Duration,
    /// May exceed 100 under parallelism
    pub cumulative_percentage: f64,
    /// Bounded to `[0, 100]`
    pub timeline_coverage_percentage: f64,
}

/// Session-wide summary as of the snapshot time
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_duration: Duration,
    /// Completed operations only
    pub total_operations: usize,
    pub in_flight_operations: usize,
    /// One entry per known category, empty categories included
    pub categories: BTreeMap<OperationCategory, CategorySummary>,
    /// Wall-clock time with any operation active
    pub overall_covered_time: Duration,
    pub overall_coverage_percentage: f64,
}

impl SessionSummary {
    /// Summary of a single category
    pub fn category(&self, category: OperationCategory) -> &CategorySummary {
        // summarize() inserts every category
        &self.categories[&category]
    }

    /// True when no time has elapsed, in which case every percentage is zero
    pub fn is_empty_session(&self) -> bool {
        self.session_duration.is_zero()
    }
}

/// `part / whole * 100`
///
/// Returns [`InstrumentationError::EmptySession`] for a zero-length `whole`
/// instead of dividing by zero.
pub fn percentage_of(part: Duration, whole: Duration) -> Result<f64> {
    if whole.is_zero() {
        return Err(InstrumentationError::EmptySession);
    }
    Ok(part.as_secs_f64() / whole.as_secs_f64() * 100.0)
}

fn percentage_or_zero(part: Duration, whole: Duration) -> f64 {
    percentage_of(part, whole).unwrap_or(0.0)
}

/// Summarize one category's completed records
pub fn summarize_category<'a, I>(records: I, session_duration: Duration) -> CategorySummary
where
    I: IntoIterator<Item = &'a OperationRecord>,
{
    let mut summary = CategorySummary::default();
    let mut intervals = Vec::new();

    for record in records {
        let (Some(duration), Some(interval)) = (record.duration(), record.interval()) else {
            continue;
        };
        summary.min_time = if summary.count == 0 {
            duration
        } else {
            summary.min_time.min(duration)
        };
        summary.max_time = summary.max_time.max(duration);
        summary.total_time += duration;
        summary.count += 1;
        intervals.push(interval);
    }

    if summary.count == 0 {
        return summary;
    }

    summary.average_time = average(summary.total_time, summary.count);
    summary.covered_time = coverage::covered_duration(intervals);
    summary.cumulative_percentage = percentage_or_zero(summary.total_time, session_duration);
    summary.timeline_coverage_percentage =
        percentage_or_zero(summary.covered_time, session_duration).min(100.0);
    summary
}

/// Summarize every category of a snapshot
pub fn summarize(snapshot: &LedgerSnapshot) -> SessionSummary {
    if snapshot.session_duration.is_zero() {
        tracing::debug!("summary requested for a zero-length session; percentages reported as 0");
    }

    let categories = OperationCategory::ALL
        .iter()
        .map(|&category| {
            (
                category,
                summarize_category(snapshot.records_in(category), snapshot.session_duration),
            )
        })
        .collect();

    let overall_covered_time = coverage::overall_coverage(snapshot);

    SessionSummary {
        session_duration: snapshot.session_duration,
        total_operations: snapshot.completed.len(),
        in_flight_operations: snapshot.in_flight,
        categories,
        overall_covered_time,
        overall_coverage_percentage: percentage_or_zero(
            overall_covered_time,
            snapshot.session_duration,
        )
        .min(100.0),
    }
}

/// Completed operations grouped by category, every category present
pub fn category_breakdown(
    snapshot: &LedgerSnapshot,
) -> BTreeMap<OperationCategory, Vec<OperationRecord>> {
    let mut breakdown: BTreeMap<OperationCategory, Vec<OperationRecord>> = OperationCategory::ALL
        .iter()
        .map(|&category| (category, Vec::new()))
        .collect();
    for record in &snapshot.completed {
        breakdown
            .entry(record.category)
            .or_default()
            .push(record.clone());
    }
    breakdown
}

fn average(total: Duration, count: usize) -> Duration {
    let nanos = total.as_nanos() / count as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OperationId;
    use crate::metadata::Metadata;
    use chrono::{DateTime, Utc};

    fn record(seq: u64, category: OperationCategory, start_ms: u64, end_ms: u64) -> OperationRecord {
        OperationRecord {
            id: OperationId::new(0, seq),
            category,
            name: format!("op_{}", seq),
            start_offset: Duration::from_millis(start_ms),
            end_offset: Some(Duration::from_millis(end_ms)),
            metadata: Metadata::new(),
        }
    }

    fn snapshot(records: Vec<OperationRecord>, session_ms: u64) -> LedgerSnapshot {
        LedgerSnapshot {
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            session_duration: Duration::from_millis(session_ms),
            completed: records,
            in_flight: 0,
        }
    }

    #[test]
    fn test_percentage_of_zero_window_signals_empty_session() {
        let err = percentage_of(Duration::from_secs(1), Duration::ZERO).unwrap_err();
        assert!(matches!(err, InstrumentationError::EmptySession));
    }

    #[test]
    fn test_percentage_of() {
        let pct = percentage_of(Duration::from_secs(30), Duration::from_secs(120)).unwrap();
        assert_eq!(pct, 25.0);
    }

    #[test]
    fn test_basic_statistics() {
        let snap = snapshot(
            vec![
                record(0, OperationCategory::DatabaseCalls, 0, 100),
                record(1, OperationCategory::DatabaseCalls, 200, 500),
                record(2, OperationCategory::DatabaseCalls, 600, 800),
            ],
            1000,
        );
        let summary = summarize(&snap);
        let db = summary.category(OperationCategory::DatabaseCalls);

        assert_eq!(db.count, 3);
        assert_eq!(db.total_time, Duration::from_millis(600));
        assert_eq!(db.min_time, Duration::from_millis(100));
        assert_eq!(db.max_time, Duration::from_millis(300));
        assert_eq!(db.average_time, Duration::from_millis(200));
        assert!((db.cumulative_percentage - 60.0).abs() < 1e-9);
        assert!((db.timeline_coverage_percentage - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_category_is_zeroed() {
        let summary = summarize(&snapshot(Vec::new(), 1000));
        assert_eq!(summary.categories.len(), OperationCategory::ALL.len());
        for stats in summary.categories.values() {
            assert_eq!(stats, &CategorySummary::default());
        }
        assert_eq!(summary.total_operations, 0);
    }

    #[test]
    fn test_zero_length_session_reports_zero_percentages() {
        let snap = snapshot(vec![record(0, OperationCategory::LlmCalls, 0, 0)], 0);
        let summary = summarize(&snap);
        let llm = summary.category(OperationCategory::LlmCalls);

        assert!(summary.is_empty_session());
        assert_eq!(llm.count, 1);
        assert_eq!(llm.cumulative_percentage, 0.0);
        assert_eq!(llm.timeline_coverage_percentage, 0.0);
        assert_eq!(summary.overall_coverage_percentage, 0.0);
    }

    #[test]
    fn test_parallel_work_exceeds_100_percent_cumulative() {
        let snap = snapshot(
            vec![
                record(0, OperationCategory::LlmCalls, 0, 100_000),
                record(1, OperationCategory::LlmCalls, 10_000, 110_000),
                record(2, OperationCategory::LlmCalls, 20_000, 120_000),
            ],
            120_000,
        );
        let summary = summarize(&snap);
        let llm = summary.category(OperationCategory::LlmCalls);

        assert_eq!(llm.cumulative_percentage, 250.0);
        assert_eq!(llm.timeline_coverage_percentage, 100.0);
        assert!(llm.cumulative_percentage >= llm.timeline_coverage_percentage);
    }

    #[test]
    fn test_overall_coverage_is_independent_of_category() {
        let snap = snapshot(
            vec![
                record(0, OperationCategory::SchemaOperations, 0, 400),
                record(1, OperationCategory::EmbeddingOperations, 200, 600),
            ],
            1000,
        );
        let summary = summarize(&snap);
        assert_eq!(summary.overall_covered_time, Duration::from_millis(600));
        assert!((summary.overall_coverage_percentage - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_groups_by_category() {
        let snap = snapshot(
            vec![
                record(0, OperationCategory::LlmCalls, 0, 10),
                record(1, OperationCategory::DatabaseCalls, 5, 15),
                record(2, OperationCategory::LlmCalls, 20, 30),
            ],
            100,
        );
        let breakdown = category_breakdown(&snap);

        assert_eq!(breakdown.len(), OperationCategory::ALL.len());
        assert_eq!(breakdown[&OperationCategory::LlmCalls].len(), 2);
        assert_eq!(breakdown[&OperationCategory::DatabaseCalls].len(), 1);
        assert!(breakdown[&OperationCategory::MinhashLshOperations].is_empty());
    }
}
