//! # Domain Models
//!
//! These structs represent the ledger entities Roving Lily reads.
//! None of them are owned here: a record is a snapshot of ledger state
//! as observed at query time.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, as reported by the ledger clock.
pub type Timestamp = u64;

/// Length of one date bucket in milliseconds.
pub const MILLIS_PER_DAY: u64 = 86_400_000;

/// Display name used when an author has no profile on the ledger.
pub const UNKNOWN_NICKNAME: &str = "Unknown";

/// Day index since the epoch (`floor(timestamp_ms / 86_400_000)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateBucket(u64);

impl DateBucket {
    pub const fn new(day: u64) -> Self {
        Self(day)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// First millisecond covered by this bucket; `None` past the timestamp range.
    pub const fn start_millis(self) -> Option<Timestamp> {
        self.0.checked_mul(MILLIS_PER_DAY)
    }

    /// Bucket holding UTC midnight of `date`. Dates before the epoch have no bucket.
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        let midnight = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
        u64::try_from(midnight)
            .ok()
            .map(|ms| Self(ms / MILLIS_PER_DAY))
    }

    /// The UTC calendar date this bucket covers.
    pub fn date(self) -> Option<NaiveDate> {
        let millis = i64::try_from(self.start_millis()?).ok()?;
        chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which day-bucketed index on the ledger to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketIndex {
    /// Posts grouped by the day they were created.
    #[default]
    PostDate,
    /// Posts grouped by the day of their most recent reply.
    LastReplyDate,
}

impl BucketIndex {
    pub fn label(self) -> &'static str {
        match self {
            BucketIndex::PostDate => "posted",
            BucketIndex::LastReplyDate => "last replied",
        }
    }
}

/// What day a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateTarget {
    /// Whatever day the ledger clock currently reads.
    #[default]
    Now,
    Bucket(DateBucket),
}

/// Ledger account identifier in its textual (SS58 or hex) form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a post record inside the ledger.
///
/// Older schema versions key posts by a plain numeric id; the current one
/// keys them by `(posted_time, author)`. Both forms can appear in a bucket.
/// On the wire a simple pointer is a number and a composite pointer is a
/// two element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostPointer {
    Simple(u32),
    Composite(Timestamp, AccountId),
}

impl fmt::Display for PostPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostPointer::Simple(id) => write!(f, "#{id}"),
            PostPointer::Composite(posted, author) => write!(f, "{posted}/{author}"),
        }
    }
}

/// Binary field as returned by the ledger.
///
/// Some gateways hand back a byte array, others a `0x`-prefixed hex string.
/// Use [`crate::codec::decode_text`] to turn either into text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// String form, `0x`-prefixed when hex encoded.
    Encoded(String),
    Raw(Vec<u8>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Raw(Vec::new())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Raw(text.as_bytes().to_vec())
    }
}

/// A post as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub id: u32,
    pub content: Payload,
    pub owner: AccountId,
    /// Pointers to the replies made to this post
    #[serde(default)]
    pub replies: Vec<PostPointer>,
    pub likes: u64,
    pub dislikes: u64,
    pub attention: u64,
    pub posted_time: Timestamp,
    pub last_reply_time: Timestamp,
}

/// Public profile attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub nickname: Payload,
}

/// The ledger's running "new posts today" monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub day: DateBucket,
    pub posts: u64,
}

/// A fully-resolved, render-ready post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: u32,
    pub nickname: String,
    pub owner: String,
    pub content: String,
    pub likes: u64,
    pub dislikes: u64,
    pub attention: u64,
    pub reply_count: usize,
    pub posted_time: Timestamp,
    pub last_reply_time: Timestamp,
}

/// Result of aggregating one date bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsPage {
    pub index: BucketIndex,
    pub bucket: DateBucket,
    /// Views in the bucket's pointer order.
    pub posts: Vec<PostView>,
    /// Pointers that no longer resolve to a record.
    pub skipped: usize,
}
