//! Cache Entry Module
//!
//! Defines the in-memory cache entry with sliding TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A stored value and the last time it was read or written.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Last `get` or `set` of this entry
    pub last_accessed: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry accessed just now.
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            last_accessed: Instant::now(),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has gone unused for longer than `ttl`.
    ///
    /// Boundary condition: an entry idle for exactly `ttl` is still live.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accessed) > ttl
    }

    // == Touch ==
    /// Resets the sliding window.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }
}
