//! # Resolvers
//!
//! Thin, single-purpose lookups over the shared ledger handle. Each one is
//! a single ledger read; none of them retry.

use std::sync::Arc;

use rl_core::{
    date_bucket, decode_text, AccountId, BucketIndex, DateBucket, LedgerError, LedgerQuery,
    PostPointer, PostRecord, ProfileRecord, UNKNOWN_NICKNAME,
};

/// Reads the ledger clock and buckets it.
#[derive(Clone)]
pub struct LedgerClock {
    ledger: Arc<dyn LedgerQuery>,
}

impl LedgerClock {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self { ledger }
    }

    pub async fn today(&self) -> Result<DateBucket, LedgerError> {
        let now = self.ledger.current_timestamp().await?;
        Ok(date_bucket(now))
    }
}

/// Date bucket → ordered post pointers.
#[derive(Clone)]
pub struct BucketResolver {
    ledger: Arc<dyn LedgerQuery>,
}

impl BucketResolver {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self { ledger }
    }

    /// `None` when the ledger has no entry for the bucket.
    pub async fn resolve(
        &self,
        index: BucketIndex,
        bucket: DateBucket,
    ) -> Result<Option<Vec<PostPointer>>, LedgerError> {
        self.ledger.get_bucket(index, bucket).await
    }
}

/// Post pointer → post record, dispatching on the pointer's schema.
#[derive(Clone)]
pub struct PostResolver {
    ledger: Arc<dyn LedgerQuery>,
}

impl PostResolver {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self { ledger }
    }

    /// `None` means the post was pruned or deleted.
    pub async fn resolve(&self, pointer: &PostPointer) -> Result<Option<PostRecord>, LedgerError> {
        match pointer {
            PostPointer::Simple(id) => self.ledger.get_post_by_id(*id).await,
            PostPointer::Composite(posted, author) => {
                self.ledger.get_post_by_key(*posted, author).await
            }
        }
    }
}

/// Owner → profile, and the nickname decoded from it.
#[derive(Clone)]
pub struct ProfileResolver {
    ledger: Arc<dyn LedgerQuery>,
}

impl ProfileResolver {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self { ledger }
    }

    pub async fn resolve(&self, owner: &AccountId) -> Result<Option<ProfileRecord>, LedgerError> {
        self.ledger.get_profile(owner).await
    }

    /// Decoded nickname, or `None` when the owner has no profile.
    pub async fn nickname(&self, owner: &AccountId) -> Result<Option<String>, LedgerError> {
        Ok(self
            .resolve(owner)
            .await?
            .map(|profile| decode_text(&profile.nickname)))
    }

    /// Display name for a [`Self::nickname`] result: `"Unknown"` when absent.
    pub fn name_or_unknown(nickname: Option<String>) -> String {
        nickname.unwrap_or_else(|| UNKNOWN_NICKNAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;
    use rl_core::{MockLedgerQuery, Payload};

    fn record(owner: &str) -> PostRecord {
        PostRecord {
            id: 1,
            content: Payload::from("hello"),
            owner: AccountId::new(owner),
            replies: vec![],
            likes: 0,
            dislikes: 0,
            attention: 0,
            posted_time: 0,
            last_reply_time: 0,
        }
    }

    #[tokio::test]
    async fn test_clock_buckets_ledger_time() {
        let mut ledger = MockLedgerQuery::new();
        ledger
            .expect_current_timestamp()
            .returning(|| Ok(19_500 * 86_400_000 + 42));

        let clock = LedgerClock::new(Arc::new(ledger));
        assert_eq!(clock.today().await.unwrap(), DateBucket::new(19_500));
    }

    #[tokio::test]
    async fn test_simple_pointer_uses_id_lookup() {
        let mut ledger = MockLedgerQuery::new();
        ledger
            .expect_get_post_by_id()
            .with(eq(7))
            .times(1)
            .returning(|_| Ok(Some(record("A"))));
        ledger.expect_get_post_by_key().never();

        let resolver = PostResolver::new(Arc::new(ledger));
        let post = resolver.resolve(&PostPointer::Simple(7)).await.unwrap();
        assert_eq!(post.unwrap().owner, AccountId::new("A"));
    }

    #[tokio::test]
    async fn test_composite_pointer_uses_key_lookup() {
        let mut ledger = MockLedgerQuery::new();
        ledger.expect_get_post_by_id().never();
        ledger
            .expect_get_post_by_key()
            .withf(|posted, author| *posted == 1_000 && author.as_str() == "B")
            .times(1)
            .returning(|_, _| Ok(None));

        let resolver = PostResolver::new(Arc::new(ledger));
        let pointer = PostPointer::Composite(1_000, AccountId::new("B"));
        assert!(resolver.resolve(&pointer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_profile_has_no_nickname() {
        let mut ledger = MockLedgerQuery::new();
        ledger.expect_get_profile().returning(|_| Ok(None));

        let resolver = ProfileResolver::new(Arc::new(ledger));
        let nickname = resolver.nickname(&AccountId::new("A")).await.unwrap();
        assert!(nickname.is_none());
        assert_eq!(ProfileResolver::name_or_unknown(nickname), "Unknown");
    }

    #[tokio::test]
    async fn test_profile_nickname_is_decoded() {
        let mut ledger = MockLedgerQuery::new();
        ledger.expect_get_profile().returning(|_| {
            Ok(Some(ProfileRecord {
                nickname: Payload::Encoded("0x4c696c79".into()),
            }))
        });

        let resolver = ProfileResolver::new(Arc::new(ledger));
        let name = resolver.nickname(&AccountId::new("B")).await.unwrap();
        assert_eq!(ProfileResolver::name_or_unknown(name), "Lily");
    }

    #[tokio::test]
    async fn test_bucket_errors_propagate() {
        let mut ledger = MockLedgerQuery::new();
        ledger
            .expect_get_bucket()
            .returning(|_, _| Err(LedgerError::Unavailable("connection refused".into())));

        let resolver = BucketResolver::new(Arc::new(ledger));
        let err = resolver
            .resolve(BucketIndex::PostDate, DateBucket::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_)));
    }
}
