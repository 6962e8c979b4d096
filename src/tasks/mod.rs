//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a store.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries every `min(ttl / 2, 24h)`

mod sweep;

pub use sweep::{spawn_sweep_task, sweep_interval, Sweep, SweepHandle, MAX_SWEEP_INTERVAL};
