//! Integration tests for session lifecycle and the core overlap scenarios
//!
//! Covers sequential tiling, full overlap, staggered overlap, in-flight
//! exclusion, double-end detection and reset.

mod utils;

use pipetime::{InstrumentationError, OperationCategory};
use std::time::Duration;
use utils::{end_at, manual_session, start_at};

#[test]
fn test_sequential_operations_tile_the_session() {
    // 10s + 20s + 30s back to back in a 60s session
    let (session, clock) = manual_session();
    let cat = OperationCategory::DatabaseCalls;

    let a = start_at(&session, &clock, 0, cat, "q1");
    end_at(&session, &clock, 10, a);
    let b = start_at(&session, &clock, 10, cat, "q2");
    end_at(&session, &clock, 30, b);
    let c = start_at(&session, &clock, 30, cat, "q3");
    end_at(&session, &clock, 60, c);

    let summary = session.summary();
    let db = summary.category(cat);
    assert_eq!(summary.session_duration, Duration::from_secs(60));
    assert_eq!(db.count, 3);
    assert_eq!(db.total_time, Duration::from_secs(60));
    assert_eq!(db.min_time, Duration::from_secs(10));
    assert_eq!(db.max_time, Duration::from_secs(30));
    assert_eq!(db.average_time, Duration::from_secs(20));
    assert_eq!(db.cumulative_percentage, 100.0);
    assert_eq!(db.timeline_coverage_percentage, 100.0);
}

#[test]
fn test_fully_overlapping_operations() {
    // Three 100s model calls fanned out at once in a 100s session
    let (session, clock) = manual_session();
    let cat = OperationCategory::LlmCalls;

    let ids: Vec<_> = (0..3)
        .map(|i| start_at(&session, &clock, 0, cat, &format!("query_{}", i)))
        .collect();
    for id in ids {
        end_at(&session, &clock, 100, id);
    }

    let summary = session.summary();
    let llm = summary.category(cat);
    assert_eq!(llm.count, 3);
    assert_eq!(llm.cumulative_percentage, 300.0);
    assert_eq!(llm.timeline_coverage_percentage, 100.0);
}

#[test]
fn test_staggered_overlapping_operations() {
    // [0,100], [10,110], [20,120] in a 120s session
    let (session, clock) = manual_session();
    let cat = OperationCategory::LlmCalls;

    let a = start_at(&session, &clock, 0, cat, "query_1");
    let b = start_at(&session, &clock, 10, cat, "query_2");
    let c = start_at(&session, &clock, 20, cat, "query_3");
    end_at(&session, &clock, 100, a);
    end_at(&session, &clock, 110, b);
    end_at(&session, &clock, 120, c);

    let summary = session.summary();
    let llm = summary.category(cat);
    assert_eq!(llm.covered_time, Duration::from_secs(120));
    assert_eq!(llm.timeline_coverage_percentage, 100.0);
    assert_eq!(llm.cumulative_percentage, 250.0);
}

#[test]
fn test_single_operation_spanning_session_is_full_coverage() {
    let (session, clock) = manual_session();
    let id = start_at(&session, &clock, 0, OperationCategory::SchemaOperations, "parse");
    end_at(&session, &clock, 45, id);

    let summary = session.summary();
    let schema = summary.category(OperationCategory::SchemaOperations);
    assert_eq!(schema.timeline_coverage_percentage, 100.0);
    assert_eq!(schema.cumulative_percentage, 100.0);
}

#[test]
fn test_disjoint_operations_coverage_equals_cumulative() {
    let (session, clock) = manual_session();
    let cat = OperationCategory::VectorDbOperations;
    let a = start_at(&session, &clock, 0, cat, "search");
    end_at(&session, &clock, 10, a);
    let b = start_at(&session, &clock, 50, cat, "search");
    end_at(&session, &clock, 60, b);
    clock.set(Duration::from_secs(100));

    let summary = session.summary();
    let vec = summary.category(cat);
    assert_eq!(vec.cumulative_percentage, 20.0);
    assert_eq!(vec.timeline_coverage_percentage, 20.0);
}

#[test]
fn test_never_ended_operation_is_invisible() {
    let (session, clock) = manual_session();
    let cat = OperationCategory::EmbeddingOperations;

    let _leaked = start_at(&session, &clock, 0, cat, "embed_forever");
    let done = start_at(&session, &clock, 5, cat, "embed");
    end_at(&session, &clock, 10, done);
    clock.set(Duration::from_secs(20));

    let summary = session.summary();
    let embed = summary.category(cat);
    assert_eq!(summary.total_operations, 1);
    assert_eq!(summary.in_flight_operations, 1);
    assert_eq!(embed.count, 1);
    assert_eq!(embed.total_time, Duration::from_secs(5));
    assert_eq!(embed.cumulative_percentage, 25.0);
    assert_eq!(embed.timeline_coverage_percentage, 25.0);

    let timeline = session.timeline();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].name, "embed");
}

#[test]
fn test_double_end_and_unknown_id_fail() {
    let (session, clock) = manual_session();
    let id = start_at(&session, &clock, 0, OperationCategory::DatabaseCalls, "q");
    end_at(&session, &clock, 1, id);

    assert!(matches!(
        session.end_operation(id),
        Err(InstrumentationError::UnknownOperation(e)) if e == id
    ));

    let never_started = pipetime::OperationId::new(id.generation(), 999);
    assert!(matches!(
        session.end_operation(never_started),
        Err(InstrumentationError::UnknownOperation(_))
    ));

    // The rejected ends did not disturb the statistics
    let summary = session.summary();
    assert_eq!(summary.category(OperationCategory::DatabaseCalls).count, 1);
    assert_eq!(
        summary.category(OperationCategory::DatabaseCalls).total_time,
        Duration::from_secs(1)
    );
}

#[test]
fn test_reset_clears_everything() {
    let (session, clock) = manual_session();
    for category in OperationCategory::ALL {
        let id = start_at(&session, &clock, 0, category, "work");
        end_at(&session, &clock, 3, id);
    }
    let _pending = start_at(&session, &clock, 3, OperationCategory::LlmCalls, "pending");

    session.reset();

    let summary = session.summary();
    assert_eq!(summary.total_operations, 0);
    assert_eq!(summary.in_flight_operations, 0);
    assert_eq!(summary.session_duration, Duration::ZERO);
    for stats in summary.categories.values() {
        assert_eq!(stats.count, 0);
        assert_eq!(stats.total_time, Duration::ZERO);
        assert_eq!(stats.cumulative_percentage, 0.0);
        assert_eq!(stats.timeline_coverage_percentage, 0.0);
    }
    assert!(session.timeline().is_empty());
}

#[test]
fn test_ids_from_before_reset_do_not_resolve() {
    let (session, clock) = manual_session();
    let stale = start_at(&session, &clock, 0, OperationCategory::LlmCalls, "before");
    session.start_session();
    let fresh = start_at(&session, &clock, 1, OperationCategory::LlmCalls, "after");

    assert!(session.end_operation(stale).is_err());
    assert!(session.end_operation(fresh).is_ok());
    assert_eq!(session.summary().total_operations, 1);
}

#[test]
fn test_zero_duration_session_reports_zero_percentages() {
    let (session, _clock) = manual_session();
    let id = session
        .start_operation(OperationCategory::MinhashLshOperations, "lsh")
        .unwrap();
    session.end_operation(id).unwrap();

    let summary = session.summary();
    assert!(summary.is_empty_session());
    let lsh = summary.category(OperationCategory::MinhashLshOperations);
    assert_eq!(lsh.count, 1);
    assert_eq!(lsh.cumulative_percentage, 0.0);
    assert_eq!(lsh.timeline_coverage_percentage, 0.0);
}

#[test]
fn test_timeline_is_start_ordered_not_completion_ordered() {
    let (session, clock) = manual_session();
    let slow = start_at(&session, &clock, 0, OperationCategory::LlmCalls, "slow");
    let fast = start_at(&session, &clock, 1, OperationCategory::DatabaseCalls, "fast");
    end_at(&session, &clock, 2, fast);
    end_at(&session, &clock, 9, slow);

    let names: Vec<String> = session.timeline().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["slow", "fast"]);
}

#[test]
fn test_stacked_timeline_from_session() {
    let (session, clock) = manual_session();
    let id = start_at(&session, &clock, 1, OperationCategory::DatabaseCalls, "q");
    end_at(&session, &clock, 2, id);
    clock.set(Duration::from_secs(3));

    let grid = session.stacked_timeline(Duration::from_secs(1)).unwrap();
    assert_eq!(grid.time_points, vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(
        grid.categories["database_calls"],
        vec![false, true, true, false]
    );
    assert_eq!(grid.active_buckets("llm_calls"), 0);
}

#[test]
fn test_category_breakdown_from_session() {
    let (session, clock) = manual_session();
    let a = start_at(&session, &clock, 0, OperationCategory::LlmCalls, "a");
    let b = start_at(&session, &clock, 0, OperationCategory::SchemaOperations, "b");
    end_at(&session, &clock, 1, a);
    end_at(&session, &clock, 1, b);

    let breakdown = session.category_breakdown();
    assert_eq!(breakdown[&OperationCategory::LlmCalls].len(), 1);
    assert_eq!(breakdown[&OperationCategory::SchemaOperations].len(), 1);
    assert!(breakdown[&OperationCategory::DatabaseCalls].is_empty());
}

#[test]
fn test_started_at_follows_wall_clock_of_restart() {
    use chrono::{TimeZone, Utc};
    use pipetime::clock::ManualClock;
    use pipetime::InstrumentationSession;

    let epoch = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let clock = ManualClock::with_epoch(epoch);
    let session = InstrumentationSession::with_clock(clock.clone());
    assert_eq!(session.started_at(), epoch);

    clock.advance_secs(30);
    let _pending = session.start_operation(OperationCategory::LlmCalls, "q").unwrap();
    assert_eq!(session.in_flight_count(), 1);

    session.start_session();
    assert_eq!(session.started_at().timestamp(), epoch.timestamp() + 30);
    assert_eq!(session.in_flight_count(), 0);
    assert_eq!(session.session_duration(), Duration::ZERO);
}
