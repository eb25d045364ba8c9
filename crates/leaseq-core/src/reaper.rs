//! Reaper: the periodic maintenance caller that reclaims stale leases.
//!
//! Claim never reclaims implicitly; without a running reaper a queue whose
//! items are all held by dead workers will starve.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::queue::Queue;

pub struct Reaper {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Reaper {
    /// Run `reclaim_stale` every `every` until shutdown.
    pub fn spawn(queue: Arc<Queue>, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match queue.reclaim_stale().await {
                            Ok(0) => {}
                            Ok(reclaimed) => info!(reclaimed, "released stale leases"),
                            Err(err) => warn!(error = %err, "reclaim pass failed"),
                        }
                    }
                }
            }
        });

        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}
