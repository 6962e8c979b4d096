//! Memory Store Module
//!
//! Concurrent in-process backend. Nothing survives a restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CacheEntry, Result, Store};
use crate::error::StoreError;
use crate::tasks::{Sweep, SweepHandle};

/// Entry map shared between the store and its sweep task.
#[derive(Debug)]
struct EntryMap {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl EntryMap {
    /// Removes `key` if it is still expired at `now`.
    ///
    /// Returns false when the key is gone or was written again since it was
    /// seen expired.
    fn remove_expired(&self, key: &str, now: Instant) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(self.ttl, now))
            .is_some()
    }
}

#[async_trait]
impl Sweep for EntryMap {
    async fn sweep(&self) -> Result<u64> {
        let now = Instant::now();
        let before = self.entries.len();
        // retain locks one shard at a time, so other keys stay available.
        self.entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

// == Memory Store ==
/// In-memory store backed by a sharded concurrent map.
///
/// `get` and `set` lock only the shard holding their key.
#[derive(Debug)]
pub struct MemoryStore {
    map: Arc<EntryMap>,
    sweeper: SweepHandle,
    closed: AtomicBool,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store and starts its sweep task.
    pub async fn open(ttl: Duration, shutdown: &CancellationToken) -> Result<Self> {
        let map = Arc::new(EntryMap {
            entries: DashMap::new(),
            ttl,
        });
        let sweeper = SweepHandle::start(map.clone(), ttl, shutdown).await?;

        Ok(Self {
            map,
            sweeper,
            closed: AtomicBool::new(false),
        })
    }

    // == Length ==
    /// Returns the number of entries held, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.map.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.map.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let now = Instant::now();
        let ttl = self.map.ttl;

        match self.map.entries.get_mut(key) {
            None => return Ok(None),
            Some(mut entry) => {
                if !entry.is_expired(ttl, now) {
                    entry.touch(now);
                    return Ok(Some(entry.value.clone()));
                }
            }
        }

        // The shard guard is released above. Re-check the predicate so a
        // concurrent set that revived the key is kept.
        if self.map.remove_expired(key, now) {
            debug!("Removed expired key {:?} on read", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.map
            .entries
            .insert(key.to_string(), CacheEntry::new(value.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.sweeper.stop();
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.map.entries.clear();
        }
        Ok(())
    }
}
