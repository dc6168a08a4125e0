//! # Aggregation Pipeline
//!
//! date target → bucket → pointers → {post → profile → decode} → page.
//!
//! Per-pointer resolution runs with bounded concurrency. Results land in a
//! slot array indexed by pointer position, so output order always matches
//! the bucket's order no matter which lookup finishes first. The first
//! ledger error drops the in-flight stream and aborts the whole page.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use rl_core::{
    decode_text, AggregateError, AggregationEvent, AggregationObserver, BucketIndex, DateBucket,
    DateTarget, LedgerError, LedgerQuery, NoopObserver, PostPointer, PostView, PostsPage, Result,
};

use crate::resolvers::{BucketResolver, LedgerClock, PostResolver, ProfileResolver};

/// Default number of pointers resolved concurrently.
pub const DEFAULT_FAN_OUT: usize = 8;

/// Builds fully-resolved post pages from the ledger.
///
/// Holds no per-request state; one instance is shared by every request.
#[derive(Clone)]
pub struct AggregationPipeline {
    ledger: Arc<dyn LedgerQuery>,
    clock: LedgerClock,
    buckets: BucketResolver,
    posts: PostResolver,
    profiles: ProfileResolver,
    observer: Arc<dyn AggregationObserver>,
    fan_out: usize,
}

impl AggregationPipeline {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self {
            clock: LedgerClock::new(ledger.clone()),
            buckets: BucketResolver::new(ledger.clone()),
            posts: PostResolver::new(ledger.clone()),
            profiles: ProfileResolver::new(ledger.clone()),
            ledger,
            observer: Arc::new(NoopObserver),
            fan_out: DEFAULT_FAN_OUT,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AggregationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Zero is treated as one (sequential resolution).
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Resolves a target to a concrete bucket, reading the clock for `Now`.
    pub async fn target_bucket(
        &self,
        target: DateTarget,
    ) -> std::result::Result<DateBucket, LedgerError> {
        match target {
            DateTarget::Now => self.clock.today().await,
            DateTarget::Bucket(bucket) => Ok(bucket),
        }
    }

    /// Aggregates every post listed under the target day in `index`.
    ///
    /// A missing bucket and a bucket with an empty pointer list both yield
    /// [`AggregateError::NoPosts`]. A bucket whose pointers are all stale
    /// yields an empty page.
    pub async fn aggregate(&self, index: BucketIndex, target: DateTarget) -> Result<PostsPage> {
        let bucket = self.target_bucket(target).await?;

        let pointers = match self.buckets.resolve(index, bucket).await? {
            Some(pointers) => pointers,
            None => {
                self.emit(AggregationEvent::BucketMissing { index, bucket });
                return Err(AggregateError::NoPosts { bucket });
            }
        };
        self.emit(AggregationEvent::BucketResolved {
            index,
            bucket,
            pointers: pointers.len(),
        });
        if pointers.is_empty() {
            return Err(AggregateError::NoPosts { bucket });
        }

        let mut slots: Vec<Option<PostView>> = Vec::with_capacity(pointers.len());
        slots.resize_with(pointers.len(), || None);

        // Items are owned so the page future stays `Send`.
        let mut resolved = stream::iter(pointers.clone().into_iter().enumerate())
            .map(|(position, pointer)| async move {
                (position, self.resolve_view(&pointer).await)
            })
            .buffer_unordered(self.fan_out);

        let mut skipped = 0;
        while let Some((position, outcome)) = resolved.next().await {
            match outcome? {
                Some(view) => slots[position] = Some(view),
                None => {
                    skipped += 1;
                    self.emit(AggregationEvent::PostSkipped {
                        bucket,
                        position,
                        pointer: pointers[position].clone(),
                    });
                }
            }
        }

        let posts: Vec<PostView> = slots.into_iter().flatten().collect();
        self.emit(AggregationEvent::Completed {
            bucket,
            rendered: posts.len(),
            skipped,
        });

        Ok(PostsPage {
            index,
            bucket,
            posts,
            skipped,
        })
    }

    /// Number of posts the ledger's monitor counted on `bucket`, if it is
    /// currently monitoring that day.
    pub async fn activity_on(
        &self,
        bucket: DateBucket,
    ) -> std::result::Result<Option<u64>, LedgerError> {
        let activity = self.ledger.get_activity().await?;
        Ok(activity
            .filter(|activity| activity.day == bucket)
            .map(|activity| activity.posts))
    }

    async fn resolve_view(
        &self,
        pointer: &PostPointer,
    ) -> std::result::Result<Option<PostView>, LedgerError> {
        let Some(post) = self.posts.resolve(pointer).await? else {
            return Ok(None);
        };

        let nickname = self.profiles.nickname(&post.owner).await?;
        if nickname.is_none() {
            self.emit(AggregationEvent::ProfileDefaulted {
                owner: post.owner.clone(),
            });
        }
        let nickname = ProfileResolver::name_or_unknown(nickname);

        Ok(Some(PostView {
            id: post.id,
            nickname,
            owner: post.owner.to_string(),
            content: decode_text(&post.content),
            likes: post.likes,
            dislikes: post.dislikes,
            attention: post.attention,
            reply_count: post.replies.len(),
            posted_time: post.posted_time,
            last_reply_time: post.last_reply_time,
        }))
    }

    fn emit(&self, event: AggregationEvent) {
        self.observer.on_event(&event);
    }
}
