//! Snapshot cache — the one in-process merged view of the fleet.
//!
//! Readers get the latest complete snapshot via an atomic swap; they
//! never observe a half-merged state. Refreshes are coalesced through a
//! single-flight gate: at most one sync runs process-wide, concurrent
//! callers wait for it instead of starting another.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleet_core::MergedUser;
use fleet_core::expiry::now_unix;

use crate::aggregator::Aggregator;

/// Process-wide snapshot of merged users.
pub struct UserCache {
    aggregator: Aggregator,
    snapshot: ArcSwap<Vec<MergedUser>>,
    /// Epoch seconds of the last successful sync; 0 = never.
    last_sync_at: AtomicI64,
    /// Whether a sync has ever completed (an empty fleet is a valid
    /// snapshot and must not re-sync on every read).
    filled: AtomicBool,
    /// Single-flight gate: the `try_lock` winner runs the sync, losers
    /// wait on `lock` for the winner to finish.
    gate: tokio::sync::Mutex<()>,
}

impl UserCache {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            snapshot: ArcSwap::new(Arc::new(Vec::new())),
            last_sync_at: AtomicI64::new(0),
            filled: AtomicBool::new(false),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The current snapshot. Triggers a synchronous refresh first if no
    /// sync has ever completed.
    pub async fn get(&self) -> Arc<Vec<MergedUser>> {
        if !self.filled.load(Ordering::Acquire) {
            self.refresh().await;
        }
        self.snapshot.load_full()
    }

    /// The current snapshot without any refresh side effects.
    pub fn peek(&self) -> Arc<Vec<MergedUser>> {
        self.snapshot.load_full()
    }

    /// Epoch seconds of the last successful sync, if any.
    pub fn last_sync_at(&self) -> Option<i64> {
        match self.last_sync_at.load(Ordering::Acquire) {
            0 => None,
            ts => Some(ts),
        }
    }

    /// Refresh the snapshot, coalescing with any in-flight sync.
    ///
    /// The winner of the gate runs the aggregator and swaps the
    /// snapshot; every other concurrent caller waits for that swap and
    /// returns without starting a second sync. A failed or cancelled
    /// sync keeps the previous snapshot; the gate guard releases on all
    /// exit paths.
    pub async fn refresh(&self) {
        match self.gate.try_lock() {
            Ok(_guard) => {
                let started = Instant::now();
                match self.aggregator.fetch_all().await {
                    Ok(users) => {
                        info!(
                            users = users.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "snapshot refreshed"
                        );
                        self.snapshot.store(Arc::new(users));
                        self.filled.store(true, Ordering::Release);
                        self.last_sync_at.store(now_unix(), Ordering::Release);
                    }
                    Err(err) => {
                        warn!(error = %err, "sync failed, keeping previous snapshot");
                    }
                }
            }
            Err(_) => {
                // Coalesced: wait until the in-flight sync releases the
                // gate, then return with its result visible.
                drop(self.gate.lock().await);
            }
        }
    }

    /// Start the periodic refresh task. The first tick fires
    /// immediately, warming the snapshot at boot.
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        debug!("refresh task shutting down");
                        return;
                    }

                    _ = ticker.tick() => {
                        cache.refresh().await;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for UserCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCache")
            .field("users", &self.snapshot.load().len())
            .field("last_sync_at", &self.last_sync_at())
            .finish_non_exhaustive()
    }
}
