//! HTTP ingestion endpoint
//!
//! Accepts one urlencoded batch of log lines per request:
//! - `bizType`: target topic, must be allow-listed
//! - `zipType`: `""`, `zip` (zlib) or `gzip`
//! - `logText`: raw or compressed newline-delimited lines
//!
//! Every line becomes one `Message`. All lines of a request share a single
//! partition key. Failures answer 460 with a `{status, message}` JSON body.

use crate::core::{Compression, DecodeError, Message};
use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::metrics::{StatCounters, StatsSnapshot};
use crate::infrastructure::pool::{PoolStatus, WorkerPool};
use crate::ingest::form::LogForm;
use crate::log_http;
use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::Level;

/// Custom "illegal parameter" status code
pub const HTTP_STATUS_ILLEGAL_PARAM: u16 = 460;

/// Raw payloads at least this long donate their prefix as partition key
pub const KEY_PREFIX_LEN: usize = 16;

/// Client-visible ingestion failure
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("bizType is nil")]
    MissingBizType,

    #[error("{0} not exist")]
    UnknownBizType(String),

    #[error("logText is nil")]
    MissingLogText,

    #[error("can not uncompress log")]
    Uncompress(#[source] DecodeError),

    #[error("appLogData is nil")]
    EmptyPayload,

    #[error("can not read request body")]
    Body(#[source] BytesRejection),

    #[error("gateway is shutting down")]
    ShuttingDown,
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            _ => illegal_param(),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "status": status.as_u16(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

fn illegal_param() -> StatusCode {
    StatusCode::from_u16(HTTP_STATUS_ILLEGAL_PARAM).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Validated, decompressed batch ready for the queue
#[derive(Debug)]
pub struct LogBatch {
    topic: Arc<str>,
    key: Bytes,
    lines: Vec<Bytes>,
}

impl LogBatch {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn lines(&self) -> &[Bytes] {
        &self.lines
    }

    /// One message per line, in text order
    pub fn into_messages(self) -> impl Iterator<Item = Message> {
        let LogBatch { topic, key, lines } = self;
        lines
            .into_iter()
            .map(move |line| Message::new(Arc::clone(&topic), key.clone(), line))
    }
}

/// HTTP ingestion handler state
pub struct HttpIngest {
    topics: HashSet<String>,
    pool: Arc<WorkerPool>,
    stats: Arc<StatCounters>,
    max_decoded: usize,
}

impl HttpIngest {
    pub fn new<I>(topics: I, pool: Arc<WorkerPool>, stats: Arc<StatCounters>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            topics: topics.into_iter().collect(),
            pool,
            stats,
            max_decoded: HttpConfig::default().max_decoded_bytes,
        }
    }

    /// Cap on the decompressed size of one `logText`
    pub fn with_max_decoded(mut self, limit: usize) -> Self {
        self.max_decoded = limit;
        self
    }

    /// Validate and decode a request into a batch
    ///
    /// Checks run in order: bizType present, bizType allowed, logText
    /// present, decompression, non-empty result.
    pub fn normalize(&self, form: LogForm) -> Result<LogBatch, IngestError> {
        let biz_type = match form.biz_type {
            Some(b) if !b.is_empty() => b,
            _ => return Err(IngestError::MissingBizType),
        };
        if !self.topics.contains(&biz_type) {
            return Err(IngestError::UnknownBizType(biz_type));
        }

        let raw = match form.log_text {
            Some(t) if !t.is_empty() => t,
            _ => return Err(IngestError::MissingLogText),
        };

        let compression = Compression::from_zip_type(form.zip_type.as_deref().unwrap_or(""));
        let payload = match compression {
            Compression::None => raw.clone(),
            codec => Bytes::from(
                codec
                    .decode(&raw, self.max_decoded)
                    .map_err(IngestError::Uncompress)?,
            ),
        };

        if payload.is_empty() {
            return Err(IngestError::EmptyPayload);
        }
        let lines = split_lines(&payload);

        Ok(LogBatch {
            topic: Arc::from(biz_type),
            key: partition_key(&raw, self.stats.http_success()),
            lines,
        })
    }

    /// Normalize and enqueue one request, updating the HTTP counters
    ///
    /// Returns the number of lines queued.
    pub async fn ingest(&self, form: LogForm, client: &str) -> Result<usize, IngestError> {
        let result = self.enqueue_batch(form, client).await;
        match &result {
            Ok(_) => self.stats.record_http_success(),
            Err(e) => {
                self.stats.record_http_error();
                log_http!(Level::WARN, client = %client, "request rejected: {}", e);
            }
        }
        result
    }

    async fn enqueue_batch(&self, form: LogForm, client: &str) -> Result<usize, IngestError> {
        let batch = self.normalize(form)?;
        let count = batch.lines().len();
        log_http!(
            Level::DEBUG,
            client = %client,
            topic = batch.topic(),
            key = %String::from_utf8_lossy(batch.key()),
            lines = count,
            "batch accepted"
        );

        for message in batch.into_messages() {
            self.pool
                .enqueue(message)
                .await
                .map_err(|_| IngestError::ShuttingDown)?;
        }
        Ok(count)
    }

    fn record_rejected_body(&self, client: &str, e: BytesRejection) -> IngestError {
        self.stats.record_http_error();
        let err = IngestError::Body(e);
        log_http!(Level::WARN, client = %client, "request rejected: {}", err);
        err
    }
}

/// Split a payload on `\n`
///
/// Interior empty segments are kept as empty lines. Only the segment after
/// a final `\n` is dropped.
pub fn split_lines(payload: &Bytes) -> Vec<Bytes> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in payload.iter().enumerate() {
        if *b == b'\n' {
            lines.push(payload.slice(start..i));
            start = i + 1;
        }
    }
    if start < payload.len() {
        lines.push(payload.slice(start..));
    }
    lines
}

/// Partition key shared by every line of one request
///
/// The first 16 raw (pre-decompression) bytes when available, otherwise
/// the current HTTP success total in decimal.
pub fn partition_key(raw: &Bytes, http_success: u64) -> Bytes {
    if raw.len() >= KEY_PREFIX_LEN {
        raw.slice(..KEY_PREFIX_LEN)
    } else {
        Bytes::from(http_success.to_string())
    }
}

/// Response body of the stats endpoint
#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub stats: StatsSnapshot,
    pub pool: PoolStatus,
}

/// Build the HTTP router
pub fn router(ingest: Arc<HttpIngest>, config: &HttpConfig) -> Router {
    Router::new()
        .route(&config.path, post(post_log))
        .route("/api/stats", get(get_stats))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .with_state(ingest)
}

/// Serve `app` until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Handler for log batch POSTs
async fn post_log(
    State(ingest): State<Arc<HttpIngest>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let client = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    log_http!(Level::DEBUG, client = %client, "log request");

    let body = match body {
        Ok(body) => body,
        Err(e) => return ingest.record_rejected_body(client, e).into_response(),
    };

    match ingest.ingest(LogForm::parse(&body), client).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": 200 }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Handler for /api/stats
async fn get_stats(State(ingest): State<Arc<HttpIngest>>) -> Json<StatsDto> {
    Json(StatsDto {
        stats: ingest.stats.snapshot(),
        pool: ingest.pool.status(),
    })
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    tracing::error!(target: "http", "handler panicked: {}", detail);

    let body = Json(json!({ "status": 500, "message": "internal error" }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
