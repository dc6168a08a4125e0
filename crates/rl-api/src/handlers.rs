//! # rl-api Handlers
//!
//! Each handler parses the request, calls the aggregation pipeline, and
//! renders the result. Nothing here touches the ledger directly.

use askama::Template;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use rl_core::{BucketIndex, DateBucket, DateTarget};
use rl_ui::{IndexTemplate, PostsTemplate};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// `?date=YYYY-MM-DD` or `?bucket=N`. Neither means "today".
///
/// Empty values count as absent, which is what an unfilled HTML date input
/// submits.
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
    pub bucket: Option<String>,
}

impl DateQuery {
    pub fn target(&self) -> Result<DateTarget, ApiError> {
        let date = self.date.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let bucket = self.bucket.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match (date, bucket) {
            (None, None) => Ok(DateTarget::Now),
            (Some(_), Some(_)) => Err(ApiError::BadRequest(
                "Use either `date` or `bucket`, not both".into(),
            )),
            (Some(date), None) => {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                    ApiError::BadRequest(format!("Invalid date `{}`, expected YYYY-MM-DD", date))
                })?;
                DateBucket::from_date(date)
                    .map(DateTarget::Bucket)
                    .ok_or_else(|| ApiError::BadRequest("Dates before 1970 have no posts".into()))
            }
            (None, Some(raw)) => {
                let bucket = raw
                    .parse::<u64>()
                    .map(DateBucket::new)
                    .map_err(|_| ApiError::BadRequest(format!("Invalid bucket `{}`", raw)))?;
                if bucket.date().is_none() {
                    return Err(ApiError::BadRequest(format!(
                        "Bucket `{}` is beyond the calendar range",
                        raw
                    )));
                }
                Ok(DateTarget::Bucket(bucket))
            }
        }
    }
}

/// GET /api/postsByDate
pub async fn posts_by_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Html<String>, ApiError> {
    render_posts(&state, BucketIndex::PostDate, &query).await
}

/// GET /api/postsByLastReplyDate
pub async fn posts_by_last_reply_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Html<String>, ApiError> {
    render_posts(&state, BucketIndex::LastReplyDate, &query).await
}

async fn render_posts(
    state: &AppState,
    index: BucketIndex,
    query: &DateQuery,
) -> Result<Html<String>, ApiError> {
    let target = query.target()?;

    let work = async {
        let page = state.pipeline.aggregate(index, target).await?;
        let activity = state.pipeline.activity_on(page.bucket).await?;
        Ok::<_, ApiError>((page, activity))
    };
    let (page, activity) = tokio::time::timeout(state.request_timeout, work)
        .await
        .map_err(|_| ApiError::Timeout)??;

    let html = PostsTemplate::new(&page, activity).render()?;
    Ok(Html(html))
}

/// GET /
pub async fn index() -> Result<Html<String>, ApiError> {
    Ok(Html(IndexTemplate::default().render()?))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

/// GET /health. Never touches the ledger.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => ([(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(date: Option<&str>, bucket: Option<&str>) -> DateQuery {
        DateQuery {
            date: date.map(Into::into),
            bucket: bucket.map(Into::into),
        }
    }

    #[test]
    fn test_no_params_means_now() {
        assert_eq!(query(None, None).target().unwrap(), DateTarget::Now);
        assert_eq!(query(Some(""), Some(" ")).target().unwrap(), DateTarget::Now);
    }

    #[test]
    fn test_date_param_maps_to_utc_bucket() {
        let target = query(Some("2023-05-23"), None).target().unwrap();
        assert_eq!(target, DateTarget::Bucket(DateBucket::new(19_500)));
    }

    #[test]
    fn test_bucket_param() {
        let target = query(None, Some("42")).target().unwrap();
        assert_eq!(target, DateTarget::Bucket(DateBucket::new(42)));
    }

    #[test]
    fn test_invalid_params_are_bad_requests() {
        for q in [
            query(Some("2023-05-23"), Some("1")),
            query(Some("yesterday"), None),
            query(Some("1969-12-31"), None),
            query(None, Some("-3")),
            query(None, Some("300000000000")),
            query(None, Some(&u64::MAX.to_string())),
        ] {
            assert!(matches!(q.target(), Err(ApiError::BadRequest(_))));
        }
    }
}
