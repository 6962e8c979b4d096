//! API Handlers
//!
//! HTTP request handlers for each script bridge endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{CacheError, Result};
use crate::models::{GetResponse, HealthResponse, SetRequest, SetResponse};
use crate::module::KvCache;
use crate::value::{self, ScriptValue};

/// Application state shared across all handlers.
///
/// `KvCache` is cheap to clone; every clone uses the same store.
#[derive(Clone)]
pub struct AppState {
    /// Script binding over the configured store
    pub cache: KvCache,
}

impl AppState {
    /// Creates a new AppState with the given cache binding.
    pub fn new(cache: KvCache) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
///
/// Decodes the wire-format value and calls `kvcache.set` with it.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let value = value::from_json(req.value)
        .map_err(|e| CacheError::InvalidRequest(format!("value: {}", e)))?;
    state
        .cache
        .call(
            "kvcache.set",
            vec![ScriptValue::string(req.key.as_str()), value],
            vec![],
        )
        .await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Calls `kvcache.get`.
/// A missing or expired key is not an error: the response carries
/// `"value": null` and `"found": false`.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .call("kvcache.get", vec![ScriptValue::string(key.as_str())], vec![])
        .await?;
    if value.is_none() {
        return Ok(Json(GetResponse::missing(key)));
    }

    let json = value::to_json(&value).map_err(|source| CacheError::Encode {
        key: key.clone(),
        source,
    })?;
    Ok(Json(GetResponse::found(key, json)))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
