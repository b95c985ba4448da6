use thiserror::Error;

use crate::model::{MatchField, RunStage};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (missing weight, unordered thresholds, etc.).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Record cannot take part in clustering. Collected into the report.
    #[error("record '{record_id}' (index {index}): malformed {field}: {reason}")]
    MalformedRecord {
        index: usize,
        record_id: String,
        field: String,
        reason: String,
    },
    /// A single pair could not be compared. The pair scores 0.0.
    #[error("scoring '{left}' vs '{right}' failed on {field}: {reason}")]
    InternalScoring {
        left: String,
        right: String,
        field: MatchField,
        reason: String,
    },
    /// A record id named by the caller is not in the batch.
    #[error("no record with id '{0}'")]
    UnknownRecord(String),
    /// Input batch could not be decoded.
    #[error("input parse error: {0}")]
    InputParse(String),
    /// Worker pool could not be built.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
    #[error("run cancelled before {stage}")]
    Cancelled { stage: RunStage },
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}
