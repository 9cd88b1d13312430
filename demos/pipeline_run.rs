//! Simulated text-to-SQL pipeline run, exported as a snapshot
//!
//! Stages: schema parsing, embedding, vector lookup, MinHash/LSH column
//! matching, two concurrent model calls, then SQL execution. The snapshot is
//! written to the path given as the first argument (default: a file in the
//! system temp directory) and can be inspected with the `pipetime` binary.
//!
//! ```bash
//! cargo run --example pipeline_run -- /tmp/run-instrumentation.json
//! pipetime summary /tmp/run-instrumentation.json
//! ```

use anyhow::Context;
use pipetime::config::PipetimeConfig;
use pipetime::metadata::metadata;
use pipetime::report;
use pipetime::{InstrumentationSession, MetadataValue, OperationCategory};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

fn stage(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("pipeline-instrumentation.json"));

    let session = InstrumentationSession::new();
    session.start_session();

    session.track_operation(OperationCategory::SchemaOperations, "parse_schema", || stage(120))?;
    session.track_operation_with(
        OperationCategory::EmbeddingOperations,
        "embed_question",
        metadata([("model", MetadataValue::from("text-embedding"))]),
        || stage(80),
    )?;
    session.track_operation_with(
        OperationCategory::VectorDbOperations,
        "similar_tables",
        metadata([("top_k", MetadataValue::from(5))]),
        || stage(60),
    )?;
    session.track_operation("minhash_lsh_operations", "match_columns", || stage(40))?;

    thread::scope(|scope| -> anyhow::Result<()> {
        let candidates = ["candidate_a", "candidate_b"];
        let mut handles = Vec::new();
        for name in candidates {
            let guard = session.track(OperationCategory::LlmCalls, name)?;
            handles.push(scope.spawn(move || {
                stage(300);
                drop(guard);
            }));
        }
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("model call panicked"))?;
        }
        Ok(())
    })?;

    let rows = session.track_operation_with(
        OperationCategory::DatabaseCalls,
        "execute_sql",
        metadata([("dialect", MetadataValue::from("sqlite"))]),
        || {
            stage(50);
            17usize
        },
    )?;
    println!("query returned {} rows", rows);

    session.print_summary();

    let config = PipetimeConfig::default();
    let grid = session.stacked_timeline(config.timeline.resolution())?;
    report::write_stacked(&grid, &mut std::io::stdout().lock())?;

    session
        .export_to_json(&path, &config.export)
        .with_context(|| format!("Failed to export snapshot to {}", path.display()))?;
    println!("snapshot written to {}", path.display());

    Ok(())
}
