//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::value::{DecodeError, EncodeError};

// == Store Error ==
/// Failures reported by a storage backend.
///
/// Engine errors are carried unchanged so callers see the original cause.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON file backend could not read or write its document.
    #[error("cache document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("storage connection lock poisoned")]
    LockPoisoned,

    #[error("store is closed")]
    Closed,
}

// == Config Error ==
/// Invalid deployment configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("unknown cache backend: {0:?} (expected memory, sqlite, postgres or jsonfile)")]
    UnknownBackend(String),

    #[error("cache backend {0} requires CACHE_DSN")]
    MissingTarget(&'static str),

    #[error("cache TTL must be greater than zero")]
    ZeroTtl,
}

// == Cache Error Enum ==
/// Unified error type for the script-facing cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Storage backend failure
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Value could not be encoded for storage
    #[error("cannot store value for key {key:?}: {source}")]
    Encode {
        key: String,
        #[source]
        source: EncodeError,
    },

    /// Stored bytes could not be decoded
    #[error("cannot decode value stored under key {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: DecodeError,
    },

    /// Builtin called with bad arguments
    #[error("{0}")]
    InvalidArgument(String),

    /// Builtin name not exported by the module
    #[error("kvcache has no member {0:?}")]
    UnknownBuiltin(String),

    /// Malformed HTTP request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Encode { .. }
            | CacheError::InvalidArgument(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::UnknownBuiltin(_) => StatusCode::NOT_FOUND,
            CacheError::Store(_) | CacheError::Decode { .. } | CacheError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_error_response_is_json() {
        let response = CacheError::InvalidRequest("bad value".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Invalid request: bad value");
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (
                CacheError::Store(StoreError::Closed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CacheError::InvalidArgument("kvcache.get: missing argument for key".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::UnknownBuiltin("delete".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                CacheError::Config(ConfigError::ZeroTtl),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);
        }
    }

    #[test]
    fn test_encode_error_names_key() {
        let err = CacheError::Encode {
            key: "k".to_string(),
            source: EncodeError::NonStringKey {
                path: "value".to_string(),
                type_name: "int",
            },
        };
        assert_eq!(
            err.to_string(),
            r#"cannot store value for key "k": value: dict key is not a string: int"#
        );
    }
}
