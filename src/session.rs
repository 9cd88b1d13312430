//! Session controller
//!
//! [`InstrumentationSession`] owns the session start time and the operation
//! ledger behind a single mutex. Every mutating entry point (start/end of an
//! operation, `start_session`, `reset`) takes the lock only long enough to
//! read the clock and touch the ledger; the tracked work itself never runs
//! under it. Read-side calls copy a [`LedgerSnapshot`] under the lock and
//! compute statistics after releasing it.
//!
//! One session is constructed per pipeline run and handed down the call
//! graph by reference (or in an `Arc`); there is no global instance.
//!
//! # Example
//!
//! ```
//! use pipetime::{InstrumentationSession, OperationCategory};
//!
//! # fn main() -> pipetime::Result<()> {
//! let session = InstrumentationSession::new();
//!
//! let rows = session.track_operation(OperationCategory::DatabaseCalls, "execute_sql", || {
//!     // run the query
//!     3
//! })?;
//! assert_eq!(rows, 3);
//!
//! let summary = session.summary();
//! assert_eq!(summary.category(OperationCategory::DatabaseCalls).count, 1);
//! # Ok(())
//! # }
//! ```

use crate::aggregate::{self, SessionSummary};
use crate::category::{IntoCategory, OperationCategory};
use crate::clock::{Clock, SystemClock};
use crate::coverage::StackedTimeline;
use crate::error::Result;
use crate::ledger::{self, LedgerSnapshot, OperationId, OperationLedger, OperationRecord};
use crate::metadata::Metadata;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct SessionState {
    started_at: DateTime<Utc>,
    /// Monotonic clock reading at session start
    start_reading: Duration,
    ledger: OperationLedger,
}

impl SessionState {
    fn begin(clock: &dyn Clock, generation: u64) -> Self {
        Self {
            started_at: clock.wall_time(),
            start_reading: clock.monotonic(),
            ledger: OperationLedger::new(generation),
        }
    }

    fn offset(&self, clock: &dyn Clock) -> Duration {
        clock.monotonic().saturating_sub(self.start_reading)
    }
}

/// Thread-safe operation tracker for one pipeline run
#[derive(Debug)]
pub struct InstrumentationSession {
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

impl Default for InstrumentationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationSession {
    /// Create a session on the system clock; the session starts immediately
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }

    /// Create a session on a custom clock; the session starts immediately
    pub fn with_clock<C: Clock>(clock: C) -> Self {
        Self::with_shared_clock(Arc::new(clock))
    }

    /// Create a session on a clock shared with other components
    pub fn with_shared_clock(clock: Arc<dyn Clock>) -> Self {
        let state = SessionState::begin(clock.as_ref(), 0);
        tracing::debug!(started_at = %state.started_at, "instrumentation session started");
        Self {
            clock,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Tracked work never runs under the lock, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// (Re)start the session: new start time, all records discarded
    ///
    /// Ids issued before this call no longer resolve.
    pub fn start_session(&self) {
        let mut state = self.lock();
        let generation = state.ledger.generation() + 1;
        *state = SessionState::begin(self.clock.as_ref(), generation);
        tracing::debug!(
            generation,
            started_at = %state.started_at,
            "instrumentation session started"
        );
    }

    /// Discard all records and restart the session clock
    ///
    /// Meant for session boundaries. Operations still in flight when this
    /// runs will fail to end with `UnknownOperation`.
    pub fn reset(&self) {
        let mut state = self.lock();
        let generation = state.ledger.generation() + 1;
        let discarded = state.ledger.len();
        *state = SessionState::begin(self.clock.as_ref(), generation);
        tracing::debug!(generation, discarded, "instrumentation session reset");
    }

    /// Start tracking an operation without metadata
    pub fn start_operation(
        &self,
        category: impl IntoCategory,
        name: impl Into<String>,
    ) -> Result<OperationId> {
        self.start_operation_with(category, name, Metadata::new())
    }

    /// Start tracking an operation
    ///
    /// Fails with `UnknownCategory` when the category does not parse. The
    /// record stays in flight, invisible to statistics, until
    /// [`end_operation`](Self::end_operation) is called with the returned id.
    pub fn start_operation_with(
        &self,
        category: impl IntoCategory,
        name: impl Into<String>,
        metadata: Metadata,
    ) -> Result<OperationId> {
        let category = category.into_category()?;
        let name = name.into();

        let mut state = self.lock();
        let start_offset = state.offset(self.clock.as_ref());
        let id = state
            .ledger
            .begin(category, name.as_str(), metadata, start_offset);
        drop(state);

        tracing::debug!(
            %id,
            %category,
            name = %name,
            start = start_offset.as_secs_f64(),
            "operation started"
        );
        Ok(id)
    }

    /// Finish an operation and return its recorded duration
    ///
    /// Fails with `UnknownOperation` if the id was never issued by this
    /// session, was already ended, or predates a reset.
    pub fn end_operation(&self, id: OperationId) -> Result<Duration> {
        let mut state = self.lock();
        let end_offset = state.offset(self.clock.as_ref());
        let outcome = state
            .ledger
            .finish(id, end_offset)
            .map(|record| (record.category, record.duration().unwrap_or_default()));
        drop(state);

        match outcome {
            Ok((category, duration)) => {
                tracing::debug!(
                    %id,
                    %category,
                    duration = duration.as_secs_f64(),
                    "operation ended"
                );
                Ok(duration)
            }
            Err(e) => {
                tracing::warn!(%id, "rejected end of operation: {}", e);
                Err(e)
            }
        }
    }

    /// Start an operation and return a guard that ends it when dropped
    pub fn track(
        &self,
        category: impl IntoCategory,
        name: impl Into<String>,
    ) -> Result<OperationGuard<'_>> {
        self.track_with(category, name, Metadata::new())
    }

    /// Like [`track`](Self::track), with metadata
    pub fn track_with(
        &self,
        category: impl IntoCategory,
        name: impl Into<String>,
        metadata: Metadata,
    ) -> Result<OperationGuard<'_>> {
        let id = self.start_operation_with(category, name, metadata)?;
        Ok(OperationGuard {
            session: self,
            id,
            finished: false,
        })
    }

    /// Run `work` as a tracked operation
    ///
    /// The operation is ended on every exit path, including a panic in
    /// `work` (the guard ends it during unwinding). Whatever `work` returns,
    /// errors included, is passed through untouched; the outer `Result` only
    /// reports an unknown category.
    pub fn track_operation<F, R>(
        &self,
        category: impl IntoCategory,
        name: impl Into<String>,
        work: F,
    ) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        self.track_operation_with(category, name, Metadata::new(), work)
    }

    /// Like [`track_operation`](Self::track_operation), with metadata
    pub fn track_operation_with<F, R>(
        &self,
        category: impl IntoCategory,
        name: impl Into<String>,
        metadata: Metadata,
        work: F,
    ) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        let _guard = self.track_with(category, name, metadata)?;
        Ok(work())
    }

    /// Copy the session state for read-side computation
    ///
    /// Only the copy happens under the lock; ordering runs after it is released.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock();
        let mut snapshot = LedgerSnapshot {
            started_at: state.started_at,
            session_duration: state.offset(self.clock.as_ref()),
            completed: state.ledger.completed(),
            in_flight: state.ledger.in_flight_count(),
        };
        drop(state);

        ledger::sort_by_start(&mut snapshot.completed);
        snapshot
    }

    /// Per-category statistics as of now
    pub fn summary(&self) -> SessionSummary {
        aggregate::summarize(&self.snapshot())
    }

    /// Completed operations in start order
    pub fn timeline(&self) -> Vec<OperationRecord> {
        self.snapshot().completed
    }

    /// Completed operations grouped by category
    pub fn category_breakdown(&self) -> BTreeMap<OperationCategory, Vec<OperationRecord>> {
        aggregate::category_breakdown(&self.snapshot())
    }

    /// Activity grid at the given bucket resolution
    pub fn stacked_timeline(&self, resolution: Duration) -> Result<StackedTimeline> {
        StackedTimeline::from_snapshot(&self.snapshot(), resolution)
    }

    /// Wall-clock time at which the current session started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.lock().started_at
    }

    /// Elapsed session time
    pub fn session_duration(&self) -> Duration {
        let state = self.lock();
        state.offset(self.clock.as_ref())
    }

    /// Number of operations started but not yet ended
    pub fn in_flight_count(&self) -> usize {
        self.lock().ledger.in_flight_count()
    }
}

/// Ends its operation when dropped
///
/// Returned by [`InstrumentationSession::track`]. Dropping the guard,
/// including during a panic unwind, records the end offset exactly once.
#[must_use = "the operation ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct OperationGuard<'a> {
    session: &'a InstrumentationSession,
    id: OperationId,
    finished: bool,
}

impl OperationGuard<'_> {
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// End the operation now and report its duration
    pub fn finish(mut self) -> Result<Duration> {
        self.finished = true;
        self.session.end_operation(self.id)
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = self.session.end_operation(self.id) {
            tracing::warn!(id = %self.id, "tracked operation could not be finalized: {}", e);
        }
    }
}
