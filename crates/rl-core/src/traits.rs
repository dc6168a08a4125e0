//! # Core Traits (Ports)
//!
//! Any ledger plugin must implement [`LedgerQuery`] to be used by the binary.
//! [`AggregationObserver`] is how the pipeline reports what it did without
//! logging from inside the core.

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::models::{
    AccountId, BucketIndex, DailyActivity, DateBucket, PostPointer, PostRecord, ProfileRecord,
    Timestamp,
};

/// Read-only query contract for the ledger.
///
/// Every call is one round trip. `Ok(None)` means the key has no entry,
/// which is never an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// The ledger clock, in milliseconds.
    async fn current_timestamp(&self) -> Result<Timestamp, LedgerError>;

    /// Pointers stored under `bucket` in the given index, in insertion order.
    async fn get_bucket(
        &self,
        index: BucketIndex,
        bucket: DateBucket,
    ) -> Result<Option<Vec<PostPointer>>, LedgerError>;

    /// Post lookup for the legacy single-key schema.
    async fn get_post_by_id(&self, id: u32) -> Result<Option<PostRecord>, LedgerError>;

    /// Post lookup for the `(posted_time, author)` schema.
    async fn get_post_by_key(
        &self,
        posted: Timestamp,
        author: &AccountId,
    ) -> Result<Option<PostRecord>, LedgerError>;

    async fn get_profile(&self, owner: &AccountId) -> Result<Option<ProfileRecord>, LedgerError>;

    /// The "new posts today" monitor, if the ledger keeps one.
    async fn get_activity(&self) -> Result<Option<DailyActivity>, LedgerError>;
}

/// Structured diagnostics emitted by the aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationEvent {
    BucketResolved {
        index: BucketIndex,
        bucket: DateBucket,
        pointers: usize,
    },
    BucketMissing {
        index: BucketIndex,
        bucket: DateBucket,
    },
    PostSkipped {
        bucket: DateBucket,
        position: usize,
        pointer: PostPointer,
    },
    ProfileDefaulted {
        owner: AccountId,
    },
    Completed {
        bucket: DateBucket,
        rendered: usize,
        skipped: usize,
    },
}

/// Receives pipeline events. Implementations must not block.
pub trait AggregationObserver: Send + Sync {
    fn on_event(&self, event: &AggregationEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AggregationObserver for NoopObserver {
    fn on_event(&self, _event: &AggregationEvent) {}
}
