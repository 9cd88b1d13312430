//! Operation categories tracked by the engine
//!
//! Categories form a closed set. Anything outside it is rejected with
//! [`InstrumentationError::UnknownCategory`] at the point an operation starts.

use crate::error::{InstrumentationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of work an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// SQL queries executed against the database
    DatabaseCalls,
    /// Language model inference and generation
    LlmCalls,
    /// Schema parsing, validation and related work
    SchemaOperations,
    /// Vector index lookups
    VectorDbOperations,
    /// Embedding generation
    EmbeddingOperations,
    /// MinHash locality-sensitive-hashing lookups
    MinhashLshOperations,
}

impl OperationCategory {
    /// Every category, in reporting order
    pub const ALL: [OperationCategory; 6] = [
        OperationCategory::DatabaseCalls,
        OperationCategory::LlmCalls,
        OperationCategory::SchemaOperations,
        OperationCategory::VectorDbOperations,
        OperationCategory::EmbeddingOperations,
        OperationCategory::MinhashLshOperations,
    ];

    /// Wire name used in snapshots (e.g. `"llm_calls"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationCategory::DatabaseCalls => "database_calls",
            OperationCategory::LlmCalls => "llm_calls",
            OperationCategory::SchemaOperations => "schema_operations",
            OperationCategory::VectorDbOperations => "vector_db_operations",
            OperationCategory::EmbeddingOperations => "embedding_operations",
            OperationCategory::MinhashLshOperations => "minhash_lsh_operations",
        }
    }

    /// Title-cased label for text reports (e.g. `"Llm Calls"`)
    pub fn display_title(&self) -> String {
        title_case(self.as_str())
    }
}

/// Title-case a snake_case category name; works for names outside the known set
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationCategory {
    type Err = InstrumentationError;

    fn from_str(s: &str) -> Result<Self> {
        OperationCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| InstrumentationError::UnknownCategory(s.to_string()))
    }
}

/// Conversion accepted by the session entry points
///
/// Typed callers pass an [`OperationCategory`] directly; callers at dynamic
/// boundaries pass the wire name and get validation on the way in.
pub trait IntoCategory {
    fn into_category(self) -> Result<OperationCategory>;
}

impl IntoCategory for OperationCategory {
    fn into_category(self) -> Result<OperationCategory> {
        Ok(self)
    }
}

impl IntoCategory for &str {
    fn into_category(self) -> Result<OperationCategory> {
        self.parse()
    }
}

impl IntoCategory for String {
    fn into_category(self) -> Result<OperationCategory> {
        self.as_str().parse()
    }
}

impl IntoCategory for &String {
    fn into_category(self) -> Result<OperationCategory> {
        self.as_str().parse()
    }
}
