//! SQLite Store Module
//!
//! Durable single-file backend. Timestamps are Unix seconds, so the TTL is
//! applied at whole-second resolution.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Result, Store};
use crate::error::StoreError;
use crate::tasks::{Sweep, SweepHandle};

/// How long a statement waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    last_accessed INTEGER NOT NULL
) STRICT";

/// Connection handle shared between the store and its sweep task.
///
/// `None` once the store is closed.
#[derive(Clone)]
struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    ttl_secs: i64,
}

impl Database {
    /// Runs `f` against the connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            Ok(f(conn)?)
        })
        .await?
    }

    fn cutoff(&self, now: i64) -> i64 {
        now - self.ttl_secs
    }
}

#[async_trait]
impl Sweep for Database {
    async fn sweep(&self) -> Result<u64> {
        let cutoff = self.cutoff(unix_now());
        let removed = self
            .run(move |conn| conn.execute("DELETE FROM kv WHERE last_accessed < ?1", params![cutoff]))
            .await?;
        Ok(removed as u64)
    }
}

// == SQLite Store ==
/// Store persisted in a SQLite database file.
///
/// Every statement runs on `tokio::task::spawn_blocking` behind a single
/// connection mutex. The database uses write-ahead logging.
pub struct SqliteStore {
    db: Database,
    sweeper: SweepHandle,
}

impl SqliteStore {
    // == Constructor ==
    /// Opens (or creates) the database at `path` and prepares the `kv` table.
    ///
    /// Pass `":memory:"` for a private in-memory database. Entries that
    /// expired while no process was running are removed before this returns.
    pub async fn open(
        path: impl AsRef<Path>,
        ttl: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let location = path.display().to_string();

        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&path)?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await??;
        info!("Opened SQLite cache database at {}", location);

        let db = Database {
            conn: Arc::new(Mutex::new(Some(conn))),
            ttl_secs: ttl_to_secs(ttl),
        };
        let sweeper = SweepHandle::start(Arc::new(db.clone()), ttl, shutdown).await?;

        Ok(Self { db, sweeper })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        let now = unix_now();
        let cutoff = self.db.cutoff(now);

        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let value: Option<Vec<u8>> = tx
                    .query_row(
                        "SELECT value FROM kv WHERE key = ?1 AND last_accessed >= ?2",
                        params![key, cutoff],
                        |row| row.get(0),
                    )
                    .optional()?;

                if value.is_some() {
                    tx.execute(
                        "UPDATE kv SET last_accessed = ?1 WHERE key = ?2",
                        params![now, key],
                    )?;
                } else {
                    tx.execute(
                        "DELETE FROM kv WHERE key = ?1 AND last_accessed < ?2",
                        params![key, cutoff],
                    )?;
                }

                tx.commit()?;
                Ok(value)
            })
            .await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = key.to_string();
        let value = value.to_vec();
        let now = unix_now();

        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value, last_accessed) VALUES (?1, ?2, ?3)
                     ON CONFLICT (key) DO UPDATE
                     SET value = excluded.value, last_accessed = excluded.last_accessed",
                    params![key, value, now],
                )
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.sweeper.stop();

        let conn = Arc::clone(&self.db.conn);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let taken = conn.lock().map_err(|_| StoreError::LockPoisoned)?.take();
            match taken {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::from(e)),
                None => Ok(()),
            }
        })
        .await?
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // In-memory databases answer "memory" here; that is fine.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(CREATE_TABLE)
}

/// Rounds sub-second remainders up so short TTLs never collapse to zero.
fn ttl_to_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::time::sleep;

    async fn memory_db(ttl: Duration) -> SqliteStore {
        SqliteStore::open(":memory:", ttl, &CancellationToken::new())
            .await
            .unwrap()
    }

    fn row_count(path: &Path) -> i64 {
        let conn = Connection::open(path).unwrap();
        conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_ttl_to_secs() {
        assert_eq!(ttl_to_secs(Duration::from_secs(60)), 60);
        assert_eq!(ttl_to_secs(Duration::from_millis(100)), 1);
        assert_eq!(ttl_to_secs(Duration::from_millis(1500)), 2);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = memory_db(Duration::from_secs(60)).await;

        store.set("key1", b"\"value1\"").await.unwrap();
        store.set("key2", b"123").await.unwrap();

        assert_eq!(
            store.get("key1").await.unwrap(),
            Some(b"\"value1\"".to_vec())
        );
        assert_eq!(store.get("key2").await.unwrap(), Some(b"123".to_vec()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = memory_db(Duration::from_secs(60)).await;
        assert_eq!(store.get("key3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = memory_db(Duration::from_secs(60)).await;

        store.set("k", b"first").await.unwrap();
        store.set("k", b"second").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_binary_values_preserved() {
        let store = memory_db(Duration::from_secs(60)).await;
        let value: Vec<u8> = (0..=255).collect();

        store.set("bin", &value).await.unwrap();
        assert_eq!(store.get("bin").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.db");
        let shutdown = CancellationToken::new();

        let store = SqliteStore::open(&path, Duration::from_secs(60), &shutdown)
            .await
            .unwrap();
        store.set("greeting", b"\"hello\"").await.unwrap();
        store.close().await.unwrap();

        let reopened = SqliteStore::open(&path, Duration::from_secs(60), &shutdown)
            .await
            .unwrap();
        assert_eq!(
            reopened.get("greeting").await.unwrap(),
            Some(b"\"hello\"".to_vec())
        );
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entry_absent_and_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.db");

        // Sweep runs every 500ms; stop it so only the read deletes.
        let store = SqliteStore::open(&path, Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap();
        store.sweeper.stop();
        store.set("k", b"v").await.unwrap();

        sleep(Duration::from_millis(2100)).await;
        assert_eq!(row_count(&path), 1);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(row_count(&path), 0);
    }

    #[tokio::test]
    async fn test_read_refreshes_last_access() {
        let store = memory_db(Duration::from_secs(1)).await;
        store.set("k", b"v").await.unwrap();

        for _ in 0..3 {
            sleep(Duration::from_millis(600)).await;
            assert!(store.get("k").await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_initial_sweep_removes_stale_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.db");

        {
            let conn = Connection::open(&path).unwrap();
            init_schema(&conn).unwrap();
            conn.execute(
                "INSERT INTO kv (key, value, last_accessed) VALUES ('old', x'00', ?1), ('new', x'01', ?2)",
                params![unix_now() - 3600, unix_now()],
            )
            .unwrap();
        }

        let store = SqliteStore::open(&path, Duration::from_secs(60), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(row_count(&path), 1);
        assert_eq!(store.get("new").await.unwrap(), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = memory_db(Duration::from_secs(60)).await;

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(store.get("k").await, Err(StoreError::Closed)));
        assert!(matches!(store.set("k", b"v").await, Err(StoreError::Closed)));
    }
}
