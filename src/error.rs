//! Error taxonomy for the instrumentation engine
//!
//! Instrumentation mistakes (an unknown category, ending an operation twice)
//! surface immediately to the caller. Failures of the *tracked* work are never
//! wrapped here; they propagate unchanged through `track_operation`.

use crate::ledger::OperationId;
use thiserror::Error;

/// Errors raised by the session, ledger and exporter
#[derive(Error, Debug)]
pub enum InstrumentationError {
    #[error("Unknown operation category '{0}' (expected one of: database_calls, llm_calls, schema_operations, vector_db_operations, embedding_operations, minhash_lsh_operations)")]
    UnknownCategory(String),

    #[error("Unknown operation {0}: never started, already ended, or from a reset session")]
    UnknownOperation(OperationId),

    #[error("Session has zero elapsed duration")]
    EmptySession,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for instrumentation operations
pub type Result<T> = std::result::Result<T, InstrumentationError>;
