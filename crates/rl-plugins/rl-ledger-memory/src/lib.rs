//! # rl-ledger-memory
//!
//! In-process implementation of `LedgerQuery`.
//! Backs the demo mode and the test suites, and can be seeded from a JSON
//! fixture shaped like the chain's storage items.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use rl_core::{
    date_bucket, AccountId, BucketIndex, DailyActivity, DateBucket, LedgerError, LedgerQuery,
    Payload, PostPointer, PostRecord, ProfileRecord, Timestamp,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk seed for a [`MemoryLedger`].
///
/// When both index maps are empty the indexes are derived from the posts
/// themselves, in file order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFixture {
    /// Fixed ledger clock. Follows the system clock when absent.
    #[serde(default)]
    pub now: Option<Timestamp>,
    #[serde(default)]
    pub posts: Vec<FixturePost>,
    #[serde(default)]
    pub posts_by_date: BTreeMap<u64, Vec<PostPointer>>,
    #[serde(default)]
    pub posts_by_last_reply_date: BTreeMap<u64, Vec<PostPointer>>,
    #[serde(default)]
    pub profiles: BTreeMap<AccountId, ProfileRecord>,
    #[serde(default)]
    pub activity: Option<DailyActivity>,
}

#[derive(Debug, Deserialize)]
pub struct FixturePost {
    pub pointer: PostPointer,
    pub record: PostRecord,
}

/// A ledger held entirely in memory.
pub struct MemoryLedger {
    /// `None` follows the system clock.
    clock: RwLock<Option<Timestamp>>,
    online: AtomicBool,
    buckets: DashMap<(BucketIndex, DateBucket), Vec<PostPointer>>,
    posts: DashMap<PostPointer, PostRecord>,
    profiles: DashMap<AccountId, ProfileRecord>,
    activity: RwLock<Option<DailyActivity>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            clock: RwLock::new(None),
            online: AtomicBool::new(true),
            buckets: DashMap::new(),
            posts: DashMap::new(),
            profiles: DashMap::new(),
            activity: RwLock::new(None),
        }
    }

    /// Loads a JSON fixture from disk.
    pub async fn from_fixture(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let ledger = Self::from_fixture_str(&raw)?;
        tracing::info!(
            "Loaded ledger fixture {} ({} posts, {} profiles)",
            path.display(),
            ledger.posts.len(),
            ledger.profiles.len()
        );
        Ok(ledger)
    }

    pub fn from_fixture_str(raw: &str) -> Result<Self, FixtureError> {
        let fixture: LedgerFixture = serde_json::from_str(raw)?;
        Ok(Self::from(fixture))
    }

    /// Pins the ledger clock.
    pub fn set_clock(&self, now: Timestamp) {
        *self.clock.write().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    /// Goes back to following the system clock.
    pub fn unpin_clock(&self) {
        *self.clock.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// While offline every query fails with `LedgerError::Unavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    /// Replaces the pointer list stored under a bucket.
    pub fn insert_bucket(
        &self,
        index: BucketIndex,
        bucket: DateBucket,
        pointers: Vec<PostPointer>,
    ) {
        self.buckets.insert((index, bucket), pointers);
    }

    /// Stores a record without touching either index.
    pub fn insert_post(&self, pointer: PostPointer, record: PostRecord) {
        self.posts.insert(pointer, record);
    }

    pub fn remove_post(&self, pointer: &PostPointer) -> Option<PostRecord> {
        self.posts.remove(pointer).map(|(_, record)| record)
    }

    /// Stores a record and appends its pointer to both day indexes, the
    /// way the chain does when a post is created.
    pub fn publish(&self, pointer: PostPointer, record: PostRecord) {
        self.buckets
            .entry((BucketIndex::PostDate, date_bucket(record.posted_time)))
            .or_default()
            .push(pointer.clone());
        self.buckets
            .entry((BucketIndex::LastReplyDate, date_bucket(record.last_reply_time)))
            .or_default()
            .push(pointer.clone());
        self.posts.insert(pointer, record);
    }

    pub fn insert_profile(&self, owner: AccountId, nickname: &str) {
        self.profiles.insert(
            owner,
            ProfileRecord {
                nickname: Payload::from(nickname),
            },
        );
    }

    pub fn set_activity(&self, activity: Option<DailyActivity>) {
        *self.activity.write().unwrap_or_else(PoisonError::into_inner) = activity;
    }

    fn ensure_online(&self) -> Result<(), LedgerError> {
        if self.online.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("memory ledger is offline".into()))
        }
    }
}

impl From<LedgerFixture> for MemoryLedger {
    fn from(fixture: LedgerFixture) -> Self {
        let ledger = MemoryLedger::new();
        if let Some(now) = fixture.now {
            ledger.set_clock(now);
        }

        let derive_indexes =
            fixture.posts_by_date.is_empty() && fixture.posts_by_last_reply_date.is_empty();
        for post in fixture.posts {
            if derive_indexes {
                ledger.publish(post.pointer, post.record);
            } else {
                ledger.insert_post(post.pointer, post.record);
            }
        }
        for (day, pointers) in fixture.posts_by_date {
            ledger.insert_bucket(BucketIndex::PostDate, DateBucket::new(day), pointers);
        }
        for (day, pointers) in fixture.posts_by_last_reply_date {
            ledger.insert_bucket(BucketIndex::LastReplyDate, DateBucket::new(day), pointers);
        }
        for (owner, profile) in fixture.profiles {
            ledger.profiles.insert(owner, profile);
        }
        ledger.set_activity(fixture.activity);
        ledger
    }
}

#[async_trait]
impl LedgerQuery for MemoryLedger {
    async fn current_timestamp(&self) -> Result<Timestamp, LedgerError> {
        self.ensure_online()?;
        let pinned = *self.clock.read().unwrap_or_else(PoisonError::into_inner);
        match pinned {
            Some(now) => Ok(now),
            None => u64::try_from(chrono::Utc::now().timestamp_millis())
                .map_err(|_| LedgerError::Malformed("system clock is before the epoch".into())),
        }
    }

    async fn get_bucket(
        &self,
        index: BucketIndex,
        bucket: DateBucket,
    ) -> Result<Option<Vec<PostPointer>>, LedgerError> {
        self.ensure_online()?;
        Ok(self.buckets.get(&(index, bucket)).map(|entry| entry.value().clone()))
    }

    async fn get_post_by_id(&self, id: u32) -> Result<Option<PostRecord>, LedgerError> {
        self.ensure_online()?;
        Ok(self
            .posts
            .get(&PostPointer::Simple(id))
            .map(|entry| entry.value().clone()))
    }

    async fn get_post_by_key(
        &self,
        posted: Timestamp,
        author: &AccountId,
    ) -> Result<Option<PostRecord>, LedgerError> {
        self.ensure_online()?;
        let pointer = PostPointer::Composite(posted, author.clone());
        Ok(self.posts.get(&pointer).map(|entry| entry.value().clone()))
    }

    async fn get_profile(&self, owner: &AccountId) -> Result<Option<ProfileRecord>, LedgerError> {
        self.ensure_online()?;
        Ok(self.profiles.get(owner).map(|entry| entry.value().clone()))
    }

    async fn get_activity(&self) -> Result<Option<DailyActivity>, LedgerError> {
        self.ensure_online()?;
        Ok(*self.activity.read().unwrap_or_else(PoisonError::into_inner))
    }
}
