//! # rl-api
//!
//! The web routing layer for Roving Lily.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observer;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use rl_core::LedgerQuery;
use rl_services::AggregationPipeline;
use tower_http::services::ServeDir;

pub use error::{ApiError, NO_POSTS_MESSAGE};
pub use observer::{Metrics, ObserverSet, TracingObserver};

/// State shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: AggregationPipeline,
    pub request_timeout: Duration,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wires a pipeline over `ledger` that reports to both the log and the
    /// metrics registry.
    pub fn new(ledger: Arc<dyn LedgerQuery>, fan_out: usize, request_timeout: Duration) -> Self {
        let metrics = Arc::new(Metrics::new());
        let observer = ObserverSet::new()
            .with(Arc::new(TracingObserver))
            .with(metrics.clone());
        let pipeline = AggregationPipeline::new(ledger)
            .with_fan_out(fan_out)
            .with_observer(Arc::new(observer));

        Self {
            pipeline,
            request_timeout,
            metrics,
        }
    }
}

/// Builds the full router, with `/static` served from `static_dir`.
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/postsByDate", get(handlers::posts_by_date))
        .route(
            "/api/postsByLastReplyDate",
            get(handlers::posts_by_last_reply_date),
        )
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(middleware::nosniff())
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
        .with_state(state)
}
