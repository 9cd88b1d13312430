//! Operation ledger
//!
//! Append-only store of the operations recorded in one session. Each record
//! moves through exactly one transition, in-flight → completed; only completed
//! records are visible to the aggregate and coverage computations.
//!
//! Ids are `(generation, sequence)` pairs. The sequence is the record's index in
//! the ledger, so lookups on `finish` are O(1), and the generation changes on
//! every reset so ids issued before a reset never resolve afterwards.

use crate::category::OperationCategory;
use crate::coverage::Interval;
use crate::error::{InstrumentationError, Result};
use crate::metadata::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId {
    generation: u64,
    sequence: u64,
}

impl OperationId {
    pub fn new(generation: u64, sequence: u64) -> Self {
        Self {
            generation,
            sequence,
        }
    }

    /// Session generation that issued this id
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Position in start order within the session
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}-{}", self.generation, self.sequence)
    }
}

/// A single tracked unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub id: OperationId,
    pub category: OperationCategory,
    /// Display label, not used for grouping
    pub name: String,
    /// Offset from session start
    pub start_offset: Duration,
    /// Offset from session start; `None` while in flight
    pub end_offset: Option<Duration>,
    pub metadata: Metadata,
}

impl OperationRecord {
    pub fn is_completed(&self) -> bool {
        self.end_offset.is_some()
    }

    /// Elapsed time between start and end, if completed
    pub fn duration(&self) -> Option<Duration> {
        self.end_offset
            .map(|end| end.saturating_sub(self.start_offset))
    }

    /// `[start, end]` interval, if completed
    pub fn interval(&self) -> Option<Interval> {
        self.end_offset
            .map(|end| Interval::new(self.start_offset, end))
    }
}

/// Append-only operation store for one session generation
#[derive(Debug, Default)]
pub struct OperationLedger {
    generation: u64,
    records: Vec<OperationRecord>,
    in_flight: usize,
}

impl OperationLedger {
    /// Create an empty ledger for the given session generation
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            records: Vec::new(),
            in_flight: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append an in-flight record and return its id
    pub fn begin(
        &mut self,
        category: OperationCategory,
        name: impl Into<String>,
        metadata: Metadata,
        start_offset: Duration,
    ) -> OperationId {
        let id = OperationId::new(self.generation, self.records.len() as u64);
        self.records.push(OperationRecord {
            id,
            category,
            name: name.into(),
            start_offset,
            end_offset: None,
            metadata,
        });
        self.in_flight += 1;
        id
    }

    /// Mark an in-flight record completed
    ///
    /// Fails with [`InstrumentationError::UnknownOperation`] when the id belongs
    /// to another generation, was never issued, or is already completed. An
    /// `end_offset` earlier than the start is clamped to the start.
    pub fn finish(&mut self, id: OperationId, end_offset: Duration) -> Result<&OperationRecord> {
        if id.generation != self.generation {
            return Err(InstrumentationError::UnknownOperation(id));
        }

        let record = usize::try_from(id.sequence)
            .ok()
            .and_then(|index| self.records.get_mut(index))
            .ok_or(InstrumentationError::UnknownOperation(id))?;

        if record.end_offset.is_some() {
            return Err(InstrumentationError::UnknownOperation(id));
        }

        record.end_offset = Some(end_offset.max(record.start_offset));
        self.in_flight -= 1;
        Ok(record)
    }

    /// Look up a record (in flight or completed)
    pub fn get(&self, id: OperationId) -> Option<&OperationRecord> {
        if id.generation != self.generation {
            return None;
        }
        usize::try_from(id.sequence)
            .ok()
            .and_then(|index| self.records.get(index))
    }

    /// Total records, in flight included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
    }

    pub fn completed_count(&self) -> usize {
        self.records.len() - self.in_flight
    }

    /// Copy of the completed records, in issue order
    ///
    /// Runs under the session lock, so it only copies; callers put the copy
    /// in start order with [`sort_by_start`] once the lock is released.
    pub fn completed(&self) -> Vec<OperationRecord> {
        self.records
            .iter()
            .filter(|record| record.is_completed())
            .cloned()
            .collect()
    }
}

/// Order records by start offset, ties broken by id
pub fn sort_by_start(records: &mut [OperationRecord]) {
    records.sort_by(|a, b| {
        a.start_offset
            .cmp(&b.start_offset)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Point-in-time copy of a session, taken under the session lock
///
/// All read-side computations (summaries, coverage, export) run on this copy
/// outside the lock.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    /// Wall-clock session start
    pub started_at: DateTime<Utc>,
    /// Elapsed session time at the moment the snapshot was taken
    pub session_duration: Duration,
    /// Completed records in start order
    pub completed: Vec<OperationRecord>,
    /// Records started but not yet ended
    pub in_flight: usize,
}

impl LedgerSnapshot {
    /// Completed records of one category, in start order
    pub fn records_in(
        &self,
        category: OperationCategory,
    ) -> impl Iterator<Item = &OperationRecord> + '_ {
        self.completed
            .iter()
            .filter(move |record| record.category == category)
    }
}
