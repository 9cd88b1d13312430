// Shared helpers for the integration tests
//
// Sessions run on a ManualClock so every offset is exact and the overlap
// scenarios are asserted without sleeping.

#![allow(dead_code)]

use pipetime::clock::ManualClock;
use pipetime::{InstrumentationSession, OperationCategory, OperationId};
use std::time::Duration;

/// Session on a hand-driven clock, plus the clock handle
pub fn manual_session() -> (InstrumentationSession, ManualClock) {
    let clock = ManualClock::new();
    (InstrumentationSession::with_clock(clock.clone()), clock)
}

/// Start an operation at absolute second `at`
pub fn start_at(
    session: &InstrumentationSession,
    clock: &ManualClock,
    at: u64,
    category: OperationCategory,
    name: &str,
) -> OperationId {
    clock.set(Duration::from_secs(at));
    session.start_operation(category, name).unwrap()
}

/// End an operation at absolute second `at`
pub fn end_at(session: &InstrumentationSession, clock: &ManualClock, at: u64, id: OperationId) {
    clock.set(Duration::from_secs(at));
    session.end_operation(id).unwrap();
}
