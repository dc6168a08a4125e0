//! Observers that turn pipeline events into logs and metrics.

use std::fmt;
use std::sync::Arc;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use rl_core::{AggregationEvent, AggregationObserver, BucketIndex};
use tracing::{debug, info};

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AggregationObserver for TracingObserver {
    fn on_event(&self, event: &AggregationEvent) {
        match event {
            AggregationEvent::BucketResolved {
                index,
                bucket,
                pointers,
            } => debug!(index = index.label(), %bucket, pointers, "bucket resolved"),
            AggregationEvent::BucketMissing { index, bucket } => {
                info!(index = index.label(), %bucket, "no posts in bucket")
            }
            AggregationEvent::PostSkipped {
                bucket,
                position,
                pointer,
            } => debug!(%bucket, position, %pointer, "stale pointer skipped"),
            AggregationEvent::ProfileDefaulted { owner } => {
                debug!(%owner, "no profile, using default nickname")
            }
            AggregationEvent::Completed {
                bucket,
                rendered,
                skipped,
            } => info!(%bucket, rendered, skipped, "page aggregated"),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelValue)]
enum IndexLabel {
    PostDate,
    LastReplyDate,
}

impl From<BucketIndex> for IndexLabel {
    fn from(index: BucketIndex) -> Self {
        match index {
            BucketIndex::PostDate => IndexLabel::PostDate,
            BucketIndex::LastReplyDate => IndexLabel::LastReplyDate,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelValue)]
enum Outcome {
    Found,
    Missing,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BucketLabels {
    index: IndexLabel,
    outcome: Outcome,
}

/// Prometheus counters fed by pipeline events.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    bucket_lookups: Family<BucketLabels, Counter>,
    posts_rendered: Counter,
    posts_skipped: Counter,
    profiles_defaulted: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("roving_lily");
        let bucket_lookups = Family::<BucketLabels, Counter>::default();
        let posts_rendered = Counter::default();
        let posts_skipped = Counter::default();
        let profiles_defaulted = Counter::default();

        registry.register(
            "bucket_lookups",
            "Date bucket lookups by index and outcome",
            bucket_lookups.clone(),
        );
        registry.register(
            "posts_rendered",
            "Posts resolved into a page",
            posts_rendered.clone(),
        );
        registry.register(
            "posts_skipped",
            "Bucket pointers whose post no longer exists",
            posts_skipped.clone(),
        );
        registry.register(
            "profiles_defaulted",
            "Posts whose author had no profile",
            profiles_defaulted.clone(),
        );

        Self {
            registry,
            bucket_lookups,
            posts_rendered,
            posts_skipped,
            profiles_defaulted,
        }
    }

    /// OpenMetrics text exposition.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }

    fn lookup(&self, index: BucketIndex, outcome: Outcome) {
        self.bucket_lookups
            .get_or_create(&BucketLabels {
                index: index.into(),
                outcome,
            })
            .inc();
    }
}

impl AggregationObserver for Metrics {
    fn on_event(&self, event: &AggregationEvent) {
        match event {
            AggregationEvent::BucketResolved { index, .. } => self.lookup(*index, Outcome::Found),
            AggregationEvent::BucketMissing { index, .. } => self.lookup(*index, Outcome::Missing),
            AggregationEvent::PostSkipped { .. } => {
                self.posts_skipped.inc();
            }
            AggregationEvent::ProfileDefaulted { .. } => {
                self.profiles_defaulted.inc();
            }
            AggregationEvent::Completed { rendered, .. } => {
                self.posts_rendered.inc_by(*rendered as u64);
            }
        }
    }
}

/// Forwards each event to several observers, in order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn AggregationObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn AggregationObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl AggregationObserver for ObserverSet {
    fn on_event(&self, event: &AggregationEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
