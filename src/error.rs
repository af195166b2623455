//! Error types shared across the rate, accrual and scoring components.
//!
//! Failures that only affect one adapter or one row are not errors at the run
//! level; they are reported as [`Degradation`] entries inside the run reports.

use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single rate-source (or market-conditions) fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source timed out")]
    Timeout,
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a persistence call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("persistence call timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid row: {0}")]
    Invalid(String),
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// The store answered but refused this row; the storage itself is healthy
    pub fn is_row_level(&self) -> bool {
        matches!(self, StoreError::Invalid(_) | StoreError::Rejected(_))
    }
}

/// Entity invariant violations raised by the domain constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{field} out of range: {detail}")]
    OutOfRange { field: &'static str, detail: String },
    #[error("min amount {min} exceeds max amount {max}")]
    AmountBounds { min: Decimal, max: Decimal },
    #[error("checkpoint precedes the position opening time")]
    CheckpointBeforeOpen,
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger data malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("advanced recommender unreachable: {0}")]
    Unreachable(String),
    #[error("advanced recommender returned unusable output: {0}")]
    BadResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("unknown job: {0}")]
    UnknownJob(String),
    #[error("job already registered: {0}")]
    DuplicateJob(String),
}

/// Run-level failures. Only these abort a sync or accrual run.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("persistence outage: none of {attempted} rows could be written ({first_error})")]
    PersistenceOutage { attempted: usize, first_error: String },
    #[error("failed to load state: {0}")]
    Load(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Locally absorbed failure, surfaced as a structured report field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    SourceUnavailable { category: String, source: String, reason: String },
    StaleData { strategy_id: i32, category: String },
    ComputationSkipped { position_id: i32, reason: String },
    PersistenceFailure { id: i32, reason: String },
}
