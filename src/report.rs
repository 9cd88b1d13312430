//! Human-readable reports
//!
//! All writers work on a [`MetricsSnapshot`] so the same output is produced
//! for a live session and for a snapshot loaded from disk.

use crate::category::title_case;
use crate::config::ExportConfig;
use crate::coverage::StackedTimeline;
use crate::metadata::MetadataValue;
use crate::session::InstrumentationSession;
use crate::snapshot::{MetricsSnapshot, TimelineEntry};
use std::io::{self, Write};

const RULE_WIDTH: usize = 80;

fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn light_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Write the category summary
///
/// Only categories with at least one operation are listed. Coverage missing
/// from an older snapshot is shown as `n/a`.
pub fn write_summary<W: Write>(snapshot: &MetricsSnapshot, out: &mut W) -> io::Result<()> {
    let summary = &snapshot.summary;

    writeln!(out)?;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out, "INSTRUMENTATION SUMMARY")?;
    writeln!(out, "{}", heavy_rule())?;
    if let Some(start) = &snapshot.session_info.start_time {
        writeln!(out, "Session Start:    {}", start)?;
    }
    writeln!(out, "Session Duration: {:.2}s", snapshot.session_duration())?;
    writeln!(out, "Total Operations: {}", summary.total_operations)?;
    if let Some(busy) = summary.overall_timeline_coverage_percentage {
        writeln!(out, "Pipeline Busy:    {:.1}% (any category active)", busy)?;
    }
    writeln!(out)?;
    writeln!(out, "Category Breakdown:")?;
    writeln!(out, "{}", light_rule())?;

    for (name, stats) in summary.categories.iter().filter(|(_, s)| s.count > 0) {
        let coverage = match stats.timeline_coverage_percentage {
            Some(pct) => format!("{:.1}%", pct),
            None => "n/a".to_string(),
        };

        writeln!(out)?;
        writeln!(out, "{}:", title_case(name))?;
        writeln!(out, "  Total Time:        {:.3}s", stats.total_time)?;
        writeln!(out, "  Timeline Coverage: {} (wall-clock)", coverage)?;
        writeln!(
            out,
            "  Cumulative Time:   {:.1}% (can exceed 100% with parallel ops)",
            stats.cumulative_percentage
        )?;
        writeln!(out, "  Call Count:        {}", stats.count)?;
        writeln!(out, "  Average Time:      {:.3}s", stats.average_time)?;
        writeln!(
            out,
            "  Min/Max Time:      {:.3}s / {:.3}s",
            stats.min_time, stats.max_time
        )?;
    }

    writeln!(out, "{}", heavy_rule())?;
    writeln!(out)?;
    writeln!(out, "Note: 'Cumulative Time' is the sum of all operation durations.")?;
    writeln!(out, "      It can exceed 100% when operations run in parallel.")?;
    writeln!(out, "      'Timeline Coverage' shows actual wall-clock time coverage.")?;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out)?;
    Ok(())
}

/// Write the timeline, one operation per line, in start order
pub fn write_timeline<W: Write>(snapshot: &MetricsSnapshot, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "{:>10} {:>10} {:>10}  {:<24} operation",
        "start", "end", "duration", "category"
    )?;
    writeln!(out, "{}", light_rule())?;
    for entry in &snapshot.timeline {
        writeln!(
            out,
            "{:>10.3} {:>10.3} {:>10.3}  {:<24} {}{}",
            entry.start,
            entry.end,
            entry.duration,
            entry.category,
            entry.operation_name,
            format_metadata(entry)
        )?;
    }
    Ok(())
}

/// Write operations grouped by category
pub fn write_breakdown<W: Write>(snapshot: &MetricsSnapshot, out: &mut W) -> io::Result<()> {
    for (category, entries) in snapshot.category_breakdown() {
        writeln!(out, "{} ({} operations)", title_case(&category), entries.len())?;
        for entry in entries {
            writeln!(
                out,
                "  {:>10.3}s  +{:.3}s  {}{}",
                entry.start,
                entry.duration,
                entry.operation_name,
                format_metadata(entry)
            )?;
        }
    }
    Ok(())
}

/// Write the stacked activity grid, one row per category
///
/// `#` marks an active bucket, `.` an idle one.
pub fn write_stacked<W: Write>(grid: &StackedTimeline, out: &mut W) -> io::Result<()> {
    let width = grid.categories.keys().map(String::len).max().unwrap_or(0);
    writeln!(out, "{} time points", grid.time_points.len())?;
    for (category, row) in &grid.categories {
        let cells: String = row.iter().map(|&active| if active { '#' } else { '.' }).collect();
        writeln!(out, "{:<width$} |{}|", category, cells, width = width)?;
    }
    Ok(())
}

fn format_metadata(entry: &TimelineEntry) -> String {
    if entry.metadata.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = entry
        .metadata
        .iter()
        .map(|(key, value)| match value {
            MetadataValue::Bool(b) => format!("{}={}", key, b),
            MetadataValue::Integer(i) => format!("{}={}", key, i),
            MetadataValue::Float(f) => format!("{}={}", key, f),
            MetadataValue::Text(s) => format!("{}={:?}", key, s),
        })
        .collect();
    format!(" [{}]", pairs.join(", "))
}

impl InstrumentationSession {
    /// Print the category summary to stderr
    pub fn print_summary(&self) {
        let snapshot = self.export_snapshot(&ExportConfig::default());
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        if let Err(e) = write_summary(&snapshot, &mut handle) {
            tracing::warn!("failed to print instrumentation summary: {}", e);
        }
    }
}
