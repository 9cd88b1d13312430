//! Snapshot export format
//!
//! The snapshot is the only file contract of the engine:
//!
//! ```text
//! {
//!   "session_info": { "start_time": "<ISO-8601>", "duration": <secs> },
//!   "summary": {
//!     "session_duration": <secs>, "total_operations": <int>,
//!     "categories": { "<name>": { "total_time", "count", "average_time",
//!         "min_time", "max_time", "cumulative_percentage",
//!         "timeline_coverage_percentage" }, ... }
//!   },
//!   "timeline": [ { "category", "operation_name", "start", "end",
//!                   "duration", "metadata" }, ... ]
//! }
//! ```
//!
//! Loading is lenient: files written by older versions may lack
//! `timeline_coverage_percentage` (or call it `timeline_percentage`), may carry
//! category names outside the current set, and may contain individual
//! malformed values. Missing or malformed numbers load as `0`, missing
//! coverage loads as `None`, and timeline entries that are not objects are
//! skipped rather than failing the whole file.

use crate::aggregate::{self, SessionSummary};
use crate::category::OperationCategory;
use crate::config::ExportConfig;
use crate::coverage::StackedTimeline;
use crate::error::Result;
use crate::ledger::{LedgerSnapshot, OperationRecord};
use crate::metadata::{Metadata, MetadataValue};
use crate::session::InstrumentationSession;
use chrono::SecondsFormat;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Root snapshot document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub session_info: SessionInfo,
    #[serde(default)]
    pub summary: SnapshotSummary,
    #[serde(default, deserialize_with = "lenient::timeline")]
    pub timeline: Vec<TimelineEntry>,
}

/// Session start and elapsed time at export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// ISO-8601 start time; `null` in files from sessions that never started
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub duration: f64,
}

/// Summary section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    #[serde(default, deserialize_with = "lenient::float")]
    pub session_duration: f64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_operations: u64,
    #[serde(default, deserialize_with = "lenient::categories")]
    pub categories: BTreeMap<String, CategoryStats>,
    /// Wall-clock share with any operation active; absent in older files
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_float"
    )]
    pub overall_timeline_coverage_percentage: Option<f64>,
}

/// Statistics of one category as written to the snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    #[serde(default, deserialize_with = "lenient::float")]
    pub total_time: f64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub count: u64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub average_time: f64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub min_time: f64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub max_time: f64,
    /// Work volume; may exceed 100
    #[serde(default, alias = "percentage", deserialize_with = "lenient::float")]
    pub cumulative_percentage: f64,
    /// Wall-clock occupancy; `None` when the file predates the metric
    #[serde(
        default,
        alias = "timeline_percentage",
        deserialize_with = "lenient::optional_float"
    )]
    pub timeline_coverage_percentage: Option<f64>,
}

/// One completed operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Start-order sequence within the session; absent in older files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub operation_name: String,
    #[serde(default, deserialize_with = "lenient::float")]
    pub start: f64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub end: f64,
    #[serde(default, deserialize_with = "lenient::float")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient::metadata")]
    pub metadata: Metadata,
}

/// Round to `places` decimal places
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

impl MetricsSnapshot {
    /// Build the snapshot document from a ledger snapshot
    pub fn from_ledger(snapshot: &LedgerSnapshot, config: &ExportConfig) -> Self {
        let summary = aggregate::summarize(snapshot);
        let secs = |d: std::time::Duration| round_to(d.as_secs_f64(), config.time_precision);
        let pct = |p: f64| round_to(p, config.percentage_precision);

        let timeline = snapshot
            .completed
            .iter()
            .map(|record| TimelineEntry::from_record(record, config.time_precision))
            .collect();

        Self {
            session_info: SessionInfo {
                start_time: Some(
                    snapshot
                        .started_at
                        .to_rfc3339_opts(SecondsFormat::Micros, true),
                ),
                duration: snapshot.session_duration.as_secs_f64(),
            },
            summary: SnapshotSummary {
                session_duration: secs(summary.session_duration),
                total_operations: summary.total_operations as u64,
                categories: summary
                    .categories
                    .iter()
                    .map(|(category, stats)| {
                        (
                            category.as_str().to_string(),
                            CategoryStats {
                                total_time: secs(stats.total_time),
                                count: stats.count as u64,
                                average_time: secs(stats.average_time),
                                min_time: secs(stats.min_time),
                                max_time: secs(stats.max_time),
                                cumulative_percentage: pct(stats.cumulative_percentage),
                                timeline_coverage_percentage: Some(pct(
                                    stats.timeline_coverage_percentage,
                                )),
                            },
                        )
                    })
                    .collect(),
                overall_timeline_coverage_percentage: Some(pct(
                    summary.overall_coverage_percentage,
                )),
            },
            timeline,
        }
    }

    /// Snapshot a live session
    pub fn capture(session: &InstrumentationSession, config: &ExportConfig) -> Self {
        Self::from_ledger(&session.snapshot(), config)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Write the snapshot to `path`, replacing any existing file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P, pretty: bool) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        tracing::debug!(
            path = %path.display(),
            operations = self.timeline.len(),
            "snapshot written"
        );
        Ok(())
    }

    /// Parse a snapshot from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a snapshot file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Session duration, falling back to `session_info.duration` for files
    /// whose summary lacks it
    pub fn session_duration(&self) -> f64 {
        if self.summary.session_duration > 0.0 {
            self.summary.session_duration
        } else {
            self.session_info.duration
        }
    }

    /// Timeline entries grouped by category name
    ///
    /// Every known category is present; unknown names from older files are kept.
    pub fn category_breakdown(&self) -> BTreeMap<String, Vec<&TimelineEntry>> {
        let mut breakdown: BTreeMap<String, Vec<&TimelineEntry>> = OperationCategory::ALL
            .iter()
            .map(|category| (category.as_str().to_string(), Vec::new()))
            .collect();
        for entry in &self.timeline {
            breakdown
                .entry(entry.category.clone())
                .or_default()
                .push(entry);
        }
        breakdown
    }

    /// Activity grid over the exported timeline
    pub fn stacked_timeline(&self, resolution_secs: f64) -> Result<StackedTimeline> {
        StackedTimeline::build(
            self.session_duration(),
            resolution_secs,
            OperationCategory::ALL
                .iter()
                .map(|category| category.as_str().to_string()),
            self.timeline
                .iter()
                .map(|entry| (entry.category.clone(), entry.start, entry.end)),
        )
    }
}

impl TimelineEntry {
    fn from_record(record: &OperationRecord, time_precision: u32) -> Self {
        let end = record.end_offset.unwrap_or(record.start_offset);
        Self {
            id: Some(record.id.sequence()),
            category: record.category.as_str().to_string(),
            operation_name: record.name.clone(),
            start: round_to(record.start_offset.as_secs_f64(), time_precision),
            end: round_to(end.as_secs_f64(), time_precision),
            duration: round_to(
                record.duration().unwrap_or_default().as_secs_f64(),
                time_precision,
            ),
            metadata: record.metadata.clone(),
        }
    }
}

impl From<&SessionSummary> for SnapshotSummary {
    /// Unrounded conversion, for callers that post-process the numbers themselves
    fn from(summary: &SessionSummary) -> Self {
        Self {
            session_duration: summary.session_duration.as_secs_f64(),
            total_operations: summary.total_operations as u64,
            categories: summary
                .categories
                .iter()
                .map(|(category, stats)| {
                    (
                        category.as_str().to_string(),
                        CategoryStats {
                            total_time: stats.total_time.as_secs_f64(),
                            count: stats.count as u64,
                            average_time: stats.average_time.as_secs_f64(),
                            min_time: stats.min_time.as_secs_f64(),
                            max_time: stats.max_time.as_secs_f64(),
                            cumulative_percentage: stats.cumulative_percentage,
                            timeline_coverage_percentage: Some(stats.timeline_coverage_percentage),
                        },
                    )
                })
                .collect(),
            overall_timeline_coverage_percentage: Some(summary.overall_coverage_percentage),
        }
    }
}

impl InstrumentationSession {
    /// Build the snapshot document for this session as of now
    pub fn export_snapshot(&self, config: &ExportConfig) -> MetricsSnapshot {
        MetricsSnapshot::capture(self, config)
    }

    /// Export this session's snapshot to a JSON file
    pub fn export_to_json<P: AsRef<Path>>(&self, path: P, config: &ExportConfig) -> Result<()> {
        self.export_snapshot(config).write_to_file(path, config.pretty)
    }
}

/// Deserializers that substitute sentinels instead of failing
mod lenient {
    use super::*;
    use serde_json::Value;

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
        Ok(optional_float(d)?.unwrap_or(0.0))
    }

    pub fn optional_float<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(value_as_f64))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().map(value_as_u64).unwrap_or(0))
    }

    pub fn categories<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<BTreeMap<String, CategoryStats>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        let Some(Value::Object(map)) = value else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .map(|(name, stats)| {
                let stats = serde_json::from_value(stats).unwrap_or_else(|e| {
                    tracing::warn!(category = %name, "malformed category stats replaced with zeros: {}", e);
                    CategoryStats::default()
                });
                (name, stats)
            })
            .collect())
    }

    pub fn timeline<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Vec<TimelineEntry>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        let Some(Value::Array(entries)) = value else {
            return Ok(Vec::new());
        };
        Ok(entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(index, "skipping malformed timeline entry: {}", e);
                    None
                }
            })
            .collect())
    }

    pub fn metadata<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Metadata, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        let Some(Value::Object(map)) = value else {
            return Ok(Metadata::new());
        };
        Ok(map
            .into_iter()
            .map(|(key, value)| {
                let (value, flattened) = MetadataValue::from_json_lossy(value);
                if flattened {
                    tracing::warn!(key = %key, "non-scalar metadata value flattened to text");
                }
                (key, value)
            })
            .collect())
    }

    fn value_as_f64(value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.filter(|f: &f64| f.is_finite())
    }

    fn value_as_u64(value: &Value) -> u64 {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}
