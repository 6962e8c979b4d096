//! JSON File Store Module
//!
//! Keeps the whole cache in one JSON document on disk:
//!
//! ```json
//! {"data": {"greeting": {"value": "ImhlbGxvIg==", "last_accessed": "2025-01-01T00:00:00Z"}}}
//! ```
//!
//! Values are base64 encoded. Every change rewrites the document through a
//! temporary file and a rename, so readers never see a partial write.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Result, Store};
use crate::error::StoreError;
use crate::tasks::{Sweep, SweepHandle};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    data: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    #[serde(with = "base64_bytes")]
    value: Vec<u8>,
    last_accessed: DateTime<Utc>,
}

impl FileEntry {
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        // A timestamp in the future (clock moved back) counts as fresh.
        matches!((now - self.last_accessed).to_std(), Ok(idle) if idle > ttl)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// The on-disk document and its in-memory copy.
///
/// `state` is `None` once the store is closed.
struct DocumentFile {
    path: PathBuf,
    ttl: Duration,
    state: Mutex<Option<Document>>,
}

impl DocumentFile {
    async fn load(path: PathBuf, ttl: Duration) -> Result<Self> {
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating cache document at {}", path.display());
                let document = Document::default();
                persist(&path, &document).await?;
                document
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            ttl,
            state: Mutex::new(Some(document)),
        })
    }

    /// Applies `f` to a copy of the document and, when `f` reports a change,
    /// keeps the copy only once it is on disk.
    async fn update<T>(&self, f: impl FnOnce(&mut Document) -> (T, bool)) -> Result<T> {
        let mut guard = self.state.lock().await;
        let document = guard.as_mut().ok_or(StoreError::Closed)?;

        let mut draft = document.clone();
        let (result, changed) = f(&mut draft);
        if changed {
            // The lock is held across the write so saves happen in order.
            persist(&self.path, &draft).await?;
            *document = draft;
        }
        Ok(result)
    }
}

#[async_trait]
impl Sweep for DocumentFile {
    async fn sweep(&self) -> Result<u64> {
        let ttl = self.ttl;
        let now = Utc::now();
        self.update(|document| {
            let before = document.data.len();
            document.data.retain(|_, entry| !entry.is_expired(ttl, now));
            let removed = (before - document.data.len()) as u64;
            (removed, removed > 0)
        })
        .await
    }
}

async fn persist(path: &Path, document: &Document) -> Result<()> {
    let bytes = serde_json::to_vec(document)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

// == JSON File Store ==
/// Store persisted as a single JSON document.
///
/// Suited to small caches: every write rewrites the whole file.
pub struct JsonFileStore {
    file: Arc<DocumentFile>,
    sweeper: SweepHandle,
}

impl JsonFileStore {
    // == Constructor ==
    /// Loads the document at `path`, creating an empty one if it is missing.
    pub async fn open(
        path: impl AsRef<Path>,
        ttl: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Self> {
        let file = Arc::new(DocumentFile::load(path.as_ref().to_path_buf(), ttl).await?);
        let sweeper = SweepHandle::start(file.clone(), ttl, shutdown).await?;
        Ok(Self { file, sweeper })
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let ttl = self.file.ttl;
        let now = Utc::now();

        self.file
            .update(|document| {
                let Some(entry) = document.data.get_mut(key) else {
                    return (None, false);
                };
                if !entry.is_expired(ttl, now) {
                    entry.last_accessed = now;
                    return (Some(entry.value.clone()), true);
                }

                document.data.remove(key);
                debug!("Removed expired key {:?} on read", key);
                (None, true)
            })
            .await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let entry = FileEntry {
            value: value.to_vec(),
            last_accessed: Utc::now(),
        };
        self.file
            .update(|document| {
                document.data.insert(key.to_string(), entry);
                ((), true)
            })
            .await
    }

    async fn close(&self) -> Result<()> {
        self.sweeper.stop();
        self.file.state.lock().await.take();
        Ok(())
    }
}
