//! HTTP sink that stores published batches and serves running totals.
//!
//! | Method | Path             | Response                                  |
//! |--------|------------------|-------------------------------------------|
//! | POST   | `/results`       | 200, empty body                           |
//! | GET    | `/results`       | every stored batch                        |
//! | GET    | `/results/total` | `{"results": <batches>, "<name>": total}` |
//!
//! The same routes are also served under `/api`.

mod cache;

pub use cache::{BatchCache, CacheError, RetentionPolicy};

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tracing::{error, info};

use crate::schema::{Batch, ResultRecord, Summary, SUMMARY_COUNT_KEY};

/// Build the collector routes over a shared cache.
pub fn router(cache: Arc<BatchCache>) -> Router {
    let routes = Router::new()
        .route("/results", get(list_results).post(submit_results))
        .route("/results/total", get(total_results));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(cache)
}

async fn submit_results(State(cache): State<Arc<BatchCache>>, body: Bytes) -> Result<StatusCode, ApiError> {
    let batch = parse_batch(&body)?;
    let records = batch.len();
    let stored = cache
        .append(batch)
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;
    info!(records, stored, "batch accepted");
    Ok(StatusCode::OK)
}

async fn list_results(State(cache): State<Arc<BatchCache>>) -> Json<Vec<Batch>> {
    Json(cache.snapshot().await)
}

async fn total_results(State(cache): State<Arc<BatchCache>>) -> Json<Summary> {
    Json(cache.summary().await)
}

/// Validate a submission: a JSON array of objects, each with a non-empty
/// `name` and a numeric `total`. Records are returned as sent.
pub fn parse_batch(body: &[u8]) -> Result<Batch, ApiError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidInput(format!("body is not JSON: {e}")))?;
    let serde_json::Value::Array(items) = value else {
        return Err(ApiError::InvalidInput("body must be a JSON array of result records".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let serde_json::Value::Object(raw) = item else {
                return Err(ApiError::InvalidInput(format!("record {i}: must be a JSON object")));
            };
            let record = ResultRecord::from_raw(&raw)
                .map_err(|e| ApiError::InvalidInput(format!("record {i}: {e}")))?;
            if record.name.trim().is_empty() {
                return Err(ApiError::InvalidInput(format!("record {i}: name must not be empty")));
            }
            if record.name == SUMMARY_COUNT_KEY {
                return Err(ApiError::InvalidInput(format!(
                    "record {i}: '{SUMMARY_COUNT_KEY}' is reserved"
                )));
            }
            if !record.total.is_finite() {
                return Err(ApiError::InvalidInput(format!("record {i}: total must be finite")));
            }
            Ok(raw)
        })
        .collect()
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed submission; nothing was stored.
    InvalidInput(String),
    /// The cache could not be written.
    Storage(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_RESULTS", msg),
            Self::Storage(msg) => {
                error!(error = %msg, "failed to store batch");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", msg)
            }
        };
        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}
