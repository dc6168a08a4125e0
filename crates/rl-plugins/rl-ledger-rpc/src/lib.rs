//! # rl-ledger-rpc
//!
//! `LedgerQuery` over JSON-RPC 2.0 / HTTP.
//!
//! Talks to a gateway that exposes the chain's `timestamp` and `bbs` storage
//! items as RPC methods. A `null` result means the storage key is empty.
//! Binary fields arrive as `0x`-prefixed hex strings and are decoded later
//! by the core.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rl_core::{
    AccountId, BucketIndex, DailyActivity, DateBucket, LedgerError, LedgerQuery, PostPointer,
    PostRecord, ProfileRecord, Timestamp,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Default gateway URL
pub const DEFAULT_LEDGER_URL: &str = "http://127.0.0.1:9944";

mod methods {
    pub const TIMESTAMP_NOW: &str = "timestamp_now";
    pub const POSTS_BY_POST_DATE: &str = "bbs_postsByPostDate";
    pub const POSTS_BY_LAST_REPLY_DATE: &str = "bbs_postsByLastReplyDate";
    pub const POST_BY_ID: &str = "bbs_postById";
    pub const POST_BY_POINTER: &str = "bbs_postsByPointers";
    pub const USERS: &str = "bbs_users";
    pub const MONITORING: &str = "bbs_monitoring";
}

// =============================================================================
// JSON-RPC 2.0 Types
// =============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    /// `null` and absent both deserialize to `Value::Null`.
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, Error)]
pub enum RpcLedgerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger returned error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("invalid response from ledger: {0}")]
    InvalidResponse(String),
}

impl From<RpcLedgerError> for LedgerError {
    fn from(err: RpcLedgerError) -> Self {
        match err {
            RpcLedgerError::Http(e) if e.is_decode() => LedgerError::Malformed(e.to_string()),
            RpcLedgerError::Http(e) => LedgerError::Unavailable(e.to_string()),
            err @ RpcLedgerError::Rpc { .. } => LedgerError::Unavailable(err.to_string()),
            RpcLedgerError::InvalidResponse(msg) => LedgerError::Malformed(msg),
        }
    }
}

// =============================================================================
// Ledger Client
// =============================================================================

#[derive(Debug)]
pub struct RpcLedgerConfig {
    pub url: String,
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for RpcLedgerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LEDGER_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Long-lived, shared connection to the ledger gateway.
#[derive(Debug)]
pub struct RpcLedger {
    client: Client,
    endpoint: String,
    token: Option<SecretString>,
    request_id: AtomicU64,
}

impl RpcLedger {
    /// Builds the client without contacting the gateway.
    pub fn new(config: RpcLedgerConfig) -> Result<Self, RpcLedgerError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.url.trim_end_matches('/').to_string(),
            token: config.token,
            request_id: AtomicU64::new(1),
        })
    }

    /// Builds the client and reads the ledger clock once so a bad URL
    /// fails at startup rather than on the first request.
    pub async fn connect(config: RpcLedgerConfig) -> Result<Self, RpcLedgerError> {
        let ledger = Self::new(config)?;
        let now: Timestamp = ledger.call(methods::TIMESTAMP_NOW, json!([])).await?;
        info!("Connected to ledger at {} (clock {})", ledger.endpoint, now);
        Ok(ledger)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends one RPC request and deserializes its result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcLedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await?.error_for_status()?;
        let rpc_response: RpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(RpcLedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(rpc_response.result).map_err(|e| {
            RpcLedgerError::InvalidResponse(format!("cannot parse {} result: {}", method, e))
        })
    }
}

#[async_trait]
impl LedgerQuery for RpcLedger {
    #[instrument(skip(self))]
    async fn current_timestamp(&self) -> Result<Timestamp, LedgerError> {
        Ok(self.call(methods::TIMESTAMP_NOW, json!([])).await?)
    }

    #[instrument(skip(self))]
    async fn get_bucket(
        &self,
        index: BucketIndex,
        bucket: DateBucket,
    ) -> Result<Option<Vec<PostPointer>>, LedgerError> {
        let method = match index {
            BucketIndex::PostDate => methods::POSTS_BY_POST_DATE,
            BucketIndex::LastReplyDate => methods::POSTS_BY_LAST_REPLY_DATE,
        };
        let pointers: Option<Vec<PostPointer>> = self.call(method, json!([bucket])).await?;
        debug!(
            "bucket {} holds {:?} pointers",
            bucket,
            pointers.as_ref().map(Vec::len)
        );
        Ok(pointers)
    }

    #[instrument(skip(self))]
    async fn get_post_by_id(&self, id: u32) -> Result<Option<PostRecord>, LedgerError> {
        Ok(self.call(methods::POST_BY_ID, json!([id])).await?)
    }

    #[instrument(skip(self))]
    async fn get_post_by_key(
        &self,
        posted: Timestamp,
        author: &AccountId,
    ) -> Result<Option<PostRecord>, LedgerError> {
        Ok(self
            .call(methods::POST_BY_POINTER, json!([posted, author]))
            .await?)
    }

    #[instrument(skip(self))]
    async fn get_profile(&self, owner: &AccountId) -> Result<Option<ProfileRecord>, LedgerError> {
        Ok(self.call(methods::USERS, json!([owner])).await?)
    }

    #[instrument(skip(self))]
    async fn get_activity(&self) -> Result<Option<DailyActivity>, LedgerError> {
        Ok(self.call(methods::MONITORING, json!([])).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use rl_core::Payload;

    type Handler = fn(&HeaderMap, &str, &Value) -> Result<Value, (i32, String)>;

    /// Starts a one-route JSON-RPC server and returns its URL.
    async fn serve(handler: Handler) -> String {
        let app = Router::new().route(
            "/",
            post(move |headers: HeaderMap, Json(request): Json<Value>| async move {
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let body = match handler(&headers, &method, &request["params"]) {
                    Ok(result) => json!({ "jsonrpc": "2.0", "result": result, "id": request["id"] }),
                    Err((code, message)) => json!({
                        "jsonrpc": "2.0",
                        "error": { "code": code, "message": message },
                        "id": request["id"]
                    }),
                };
                Json(body)
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn ledger(url: String) -> RpcLedger {
        RpcLedger::new(RpcLedgerConfig {
            url,
            ..Default::default()
        })
        .unwrap()
    }

    fn gateway(_: &HeaderMap, method: &str, params: &Value) -> Result<Value, (i32, String)> {
        match method {
            "timestamp_now" => Ok(json!(1_684_800_000_000u64)),
            "bbs_postsByPostDate" if params[0] == 19_500 => Ok(json!([7, [1_684_800_000_000u64, "5Grw"]])),
            "bbs_postsByPostDate" | "bbs_postsByLastReplyDate" => Ok(Value::Null),
            "bbs_postsByPointers" => {
                assert_eq!(params, &json!([1_684_800_000_000u64, "5Grw"]));
                Ok(json!({
                    "id": 3,
                    "content": "0x6869",
                    "owner": "5Grw",
                    "replies": [[1_684_800_100_000u64, "5FHn"]],
                    "likes": 2,
                    "dislikes": 1,
                    "attention": 5,
                    "postedTime": 1_684_800_000_000u64,
                    "lastReplyTime": 1_684_800_100_000u64
                }))
            }
            "bbs_postById" => Ok(Value::Null),
            "bbs_users" => Ok(json!({ "nickname": "0x4c696c79" })),
            "bbs_monitoring" => Ok(json!({ "day": 19_500, "posts": 3 })),
            other => Err((-32601, format!("Method '{}' not found", other))),
        }
    }

    #[tokio::test]
    async fn test_reads_clock_and_buckets() {
        let ledger = ledger(serve(gateway).await);

        assert_eq!(ledger.current_timestamp().await.unwrap(), 1_684_800_000_000);

        let pointers = ledger
            .get_bucket(BucketIndex::PostDate, DateBucket::new(19_500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            pointers,
            vec![
                PostPointer::Simple(7),
                PostPointer::Composite(1_684_800_000_000, AccountId::new("5Grw")),
            ]
        );

        let missing = ledger
            .get_bucket(BucketIndex::LastReplyDate, DateBucket::new(19_500))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_reads_records() {
        let ledger = ledger(serve(gateway).await);

        let post = ledger
            .get_post_by_key(1_684_800_000_000, &AccountId::new("5Grw"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.content, Payload::Encoded("0x6869".into()));
        assert_eq!(post.replies.len(), 1);
        assert!(ledger.get_post_by_id(3).await.unwrap().is_none());

        let profile = ledger
            .get_profile(&AccountId::new("5Grw"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.nickname, Payload::Encoded("0x4c696c79".into()));

        let activity = ledger.get_activity().await.unwrap().unwrap();
        assert_eq!(activity.posts, 3);
    }

    #[tokio::test]
    async fn test_rpc_error_is_unavailable() {
        let ledger = ledger(serve(|_, _, _| Err((-32603, "state pruned".into()))).await);
        let err = ledger.current_timestamp().await.unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(msg) if msg.contains("state pruned")));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_malformed() {
        let ledger = ledger(serve(|_, _, _| Ok(json!({ "not": "a list" }))).await);
        let err = ledger
            .get_bucket(BucketIndex::PostDate, DateBucket::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let ledger = ledger(format!("http://{}", addr));
        let err = ledger.current_timestamp().await.unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_connect_probes_clock_and_sends_token() {
        let url = serve(|headers, method, _| {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if auth != "Bearer s3cret" {
                return Err((-32005, "unauthorized".into()));
            }
            assert_eq!(method, "timestamp_now");
            Ok(json!(5))
        })
        .await;

        let ledger = RpcLedger::connect(RpcLedgerConfig {
            url: format!("{}/", url),
            token: Some(SecretString::new("s3cret".to_string().into_boxed_str())),
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
        assert_eq!(ledger.endpoint(), url);
    }

    #[test]
    fn test_request_ids_increment() {
        let ledger = ledger(DEFAULT_LEDGER_URL.to_string());
        assert_eq!(ledger.next_id(), 1);
        assert_eq!(ledger.next_id(), 2);
    }
}
