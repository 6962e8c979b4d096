//! Store Module
//!
//! Byte-oriented key-value storage with sliding TTL expiration.
//!
//! Every backend follows the same policy: an entry is expired once
//! `now - last_accessed > ttl`, reading or writing a live entry resets
//! `last_accessed`, expired entries read as absent and are deleted on sight,
//! and a background sweep removes the rest.

mod entry;
mod jsonfile;
mod memory;
mod postgres;
mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Backend;
use crate::error::StoreError;

pub use entry::CacheEntry;
pub use jsonfile::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Convenience Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// == Store Trait ==
/// A key-value store over raw bytes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieves the value for `key`, refreshing its last-access time.
    ///
    /// Returns `Ok(None)` when the key was never set or has expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, overwriting any previous entry and
    /// resetting its last-access time.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Stops the background sweep and releases the underlying storage.
    ///
    /// Safe to call more than once. Later operations fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> Result<()>;
}

// == Open ==
/// Opens the configured backend.
///
/// The store's sweep task also stops when `shutdown` is cancelled.
pub async fn open(
    backend: &Backend,
    ttl: Duration,
    shutdown: &CancellationToken,
) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match backend {
        Backend::Memory => Arc::new(MemoryStore::open(ttl, shutdown).await?),
        Backend::Sqlite { path } => Arc::new(SqliteStore::open(path, ttl, shutdown).await?),
        Backend::Postgres { url } => Arc::new(PostgresStore::open(url, ttl, shutdown).await?),
        Backend::JsonFile { path } => Arc::new(JsonFileStore::open(path, ttl, shutdown).await?),
    };
    info!("Opened {} cache store with TTL of {:?}", backend.name(), ttl);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_backend() {
        let shutdown = CancellationToken::new();
        let store = open(&Backend::Memory, Duration::from_secs(60), &shutdown)
            .await
            .unwrap();

        store.set("greeting", b"\"hello\"").await.unwrap();
        assert_eq!(
            store.get("greeting").await.unwrap(),
            Some(b"\"hello\"".to_vec())
        );
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::Sqlite {
            path: dir.path().join("kv.db"),
        };
        let shutdown = CancellationToken::new();

        let store = open(&backend, Duration::from_secs(60), &shutdown)
            .await
            .unwrap();
        store.set("count", b"123").await.unwrap();
        assert_eq!(store.get("count").await.unwrap(), Some(b"123".to_vec()));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_postgres_backend_unreachable() {
        let backend = Backend::Postgres {
            url: "not a connection string".to_string(),
        };
        let shutdown = CancellationToken::new();

        let result = open(&backend, Duration::from_secs(60), &shutdown).await;
        assert!(matches!(result, Err(StoreError::Postgres(_))));
    }
}
