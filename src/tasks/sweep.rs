//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// Upper bound on the time between two sweeps.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Storage that can drop every expired entry in one pass.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    /// Deletes expired entries and returns how many were removed.
    async fn sweep(&self) -> Result<u64, StoreError>;
}

/// Returns the pause between sweeps for a given TTL: `min(ttl / 2, 24h)`.
pub fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task sleeps for [`sweep_interval`] between passes and exits as soon as
/// `token` is cancelled, whether it is sleeping or about to sweep. A failed
/// pass is logged and retried on the next tick.
///
/// # Example
/// ```ignore
/// let token = CancellationToken::new();
/// let handle = spawn_sweep_task(target, Duration::from_secs(60), token.clone());
/// // Later, during shutdown:
/// token.cancel();
/// ```
pub fn spawn_sweep_task(
    target: Arc<dyn Sweep>,
    ttl: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    let interval = sweep_interval(ttl);

    tokio::spawn(async move {
        info!("Starting TTL sweep task with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("TTL sweep task cancelled");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match target.sweep().await {
                Ok(0) => debug!("TTL sweep: no expired entries found"),
                Ok(removed) => info!("TTL sweep: removed {} expired entries", removed),
                Err(e) => warn!("TTL sweep failed: {}", e),
            }
        }
    })
}

// == Sweep Handle ==
/// Owns the sweep task of one store instance.
///
/// Stopping only signals the task; it never waits for a pass in progress.
/// Dropping the handle stops the task as well.
#[derive(Debug)]
pub struct SweepHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Runs one sweep inline, then starts the periodic task.
    ///
    /// The task stops when either [`SweepHandle::stop`] is called or `shutdown`
    /// is cancelled.
    pub async fn start(
        target: Arc<dyn Sweep>,
        ttl: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Self, StoreError> {
        let removed = target.sweep().await?;
        if removed > 0 {
            info!("Initial TTL sweep removed {} expired entries", removed);
        }

        let token = shutdown.child_token();
        let handle = spawn_sweep_task(target, ttl, token.clone());
        Ok(Self { token, handle })
    }

    /// Signals the task to exit.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
