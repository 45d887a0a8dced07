//! Error taxonomy (spec §7). Every layer facing the outside world converts
//! its failures into one of these kinds before degrading; only `ConfigError`
//! and `AllSourcesFailed` are meant to surface above the orchestrator.

use thiserror::Error;

/// The eight-kind error taxonomy from spec §7. Mirrors the teacher's
/// `EngineError` (`Blocked`/`Transient`/`Fatal`) generalized to the full set.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient error: {0}")]
    Transient(String),

    #[error("permanent error: {0}")]
    Permanent(String),

    #[error("duplicate canonical url: {0}")]
    DuplicateCanonicalUrl(String),

    #[error("backend failure: {backend} — {detail}")]
    BackendFailure { backend: String, detail: String },

    #[error("all sources failed: {failed_backends:?}")]
    AllSourcesFailed { failed_backends: Vec<String> },

    #[error("quota exhausted for {0}")]
    QuotaExhausted(String),

    #[error("corrupted record (row {row_id}): {detail}")]
    CorruptedRecord { row_id: String, detail: String },

    #[error("config error: {0}")]
    ConfigError(String),
}

impl PipelineError {
    pub fn kind(&self) -> crate::core::types::ErrorKind {
        use crate::core::types::ErrorKind;
        match self {
            PipelineError::Transient(_) => ErrorKind::Transient,
            PipelineError::Permanent(_) => ErrorKind::Permanent,
            PipelineError::DuplicateCanonicalUrl(_) => ErrorKind::DuplicateCanonicalUrl,
            PipelineError::BackendFailure { .. } => ErrorKind::BackendFailure,
            PipelineError::AllSourcesFailed { .. } => ErrorKind::AllSourcesFailed,
            PipelineError::QuotaExhausted(_) => ErrorKind::QuotaExhausted,
            PipelineError::CorruptedRecord { .. } => ErrorKind::CorruptedRecord,
            PipelineError::ConfigError(_) => ErrorKind::ConfigError,
        }
    }

    /// Whether a caller should retry with backoff (spec §7 Transient row).
    pub fn retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }
}

/// A single backend/collector failure recorded for run statistics, never
/// propagated — collectors and backends absorb their own exceptions (spec
/// §4.4, §4.7) and return this as data instead.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackendError {
    pub query: String,
    pub kind: String,
    pub detail: String,
}

/// Error surface for the document store (spec §4.1). `rusqlite::Error` is
/// wrapped rather than re-exported so callers match on taxonomy, not driver
/// internals.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate canonical url")]
    DuplicateCanonicalUrl,

    #[error("corrupted record: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Migration(#[from] anyhow::Error),
}
