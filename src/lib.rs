//! Pipetime - operation timing and timeline coverage for multi-stage pipelines
//!
//! This library records the start and end of every tracked unit of work in a
//! pipeline run (model calls, SQL queries, vector lookups, embedding and LSH
//! work, schema parsing), classifies each into a fixed category, and derives
//! two views of the run: how much work each category did (cumulative, may
//! exceed 100% under parallelism) and how much wall-clock time it actually
//! occupied (timeline coverage, bounded at 100%).

pub mod aggregate;
pub mod category;
pub mod cli;
pub mod clock;
pub mod config;
pub mod coverage;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod report;
pub mod session;
pub mod snapshot;

pub use aggregate::{CategorySummary, SessionSummary};
pub use category::OperationCategory;
pub use error::{InstrumentationError, Result};
pub use ledger::{OperationId, OperationRecord};
pub use metadata::{Metadata, MetadataValue};
pub use session::{InstrumentationSession, OperationGuard};
pub use snapshot::MetricsSnapshot;
