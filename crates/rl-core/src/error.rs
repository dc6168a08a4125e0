//! # Errors
//!
//! Failure taxonomy shared by the ledger ports and the aggregation pipeline.
//! Absent posts and absent profiles are not errors; they never show up here.

use thiserror::Error;

use crate::models::DateBucket;

/// Failure talking to the ledger. Always aborts the current request.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Connectivity or timeout failure (e.g., node down, gateway unreachable)
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger answered with something that cannot be interpreted
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Outcome of an aggregation that produced no page.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// Expected "nothing posted that day" outcome; not an internal error.
    #[error("no posts found for date bucket {bucket}")]
    NoPosts { bucket: DateBucket },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AggregateError {
    pub fn is_no_posts(&self) -> bool {
        matches!(self, AggregateError::NoPosts { .. })
    }
}

/// A specialized Result type for aggregation.
pub type Result<T> = std::result::Result<T, AggregateError>;
