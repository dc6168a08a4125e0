//! # rl-services
//!
//! The resolvers and the aggregation pipeline. Everything here talks to the
//! ledger only through `rl_core::LedgerQuery` and reports diagnostics only
//! through `rl_core::AggregationObserver`.

pub mod aggregator;
pub mod resolvers;

pub use aggregator::{AggregationPipeline, DEFAULT_FAN_OUT};
pub use resolvers::{BucketResolver, LedgerClock, PostResolver, ProfileResolver};
