//! Date bucketing: ledger clock reading → day index.

use crate::models::{DateBucket, Timestamp, MILLIS_PER_DAY};

/// Bucket containing `timestamp_ms`. Integer division, so every millisecond
/// of a UTC day maps to the same bucket.
pub fn date_bucket(timestamp_ms: Timestamp) -> DateBucket {
    DateBucket::new(timestamp_ms / MILLIS_PER_DAY)
}
