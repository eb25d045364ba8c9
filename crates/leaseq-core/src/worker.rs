//! Worker group: the consumer side of the claim/complete/report-error cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::WorkItem;
use crate::queue::Queue;

/// Processes one claimed item.
///
/// The queue decides what the outcome means: `Ok` completes and removes the
/// item, `Err` reports the failure and releases it for retry.
#[async_trait]
pub trait ItemHandler: Send + Sync {
    async fn process(&self, item: &WorkItem) -> Result<(), String>;
}

/// Worker group handle.
/// - `request_shutdown()` stops workers from taking new claims.
/// - `shutdown_and_join()` waits for in-flight items to finish.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers claiming as `<claimant>-<index>`.
    ///
    /// The suffix keeps claimant identifiers unique per worker, which the
    /// lease protocol requires to tell leases apart.
    pub fn spawn(
        n: usize,
        claimant: &str,
        queue: Arc<Queue>,
        handler: Arc<dyn ItemHandler>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let locked_by = format!("{claimant}-{worker_id}");
            let q = Arc::clone(&queue);
            let h = Arc::clone(&handler);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(locked_by, q, h, poll_interval, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers. In-flight handler execution is not
    /// cancelled; workers just stop taking new claims.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    locked_by: String,
    queue: Arc<Queue>,
    handler: Arc<dyn ItemHandler>,
    poll_interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let claimed = match queue.claim(&locked_by).await {
            Ok(claimed) => claimed,
            Err(err) => {
                warn!(%locked_by, error = %err, "claim failed");
                None
            }
        };

        let Some(item) = claimed else {
            // Nothing eligible: back off, but stay responsive to shutdown.
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        };

        match handler.process(&item).await {
            Ok(()) => match queue.complete(&item, &locked_by).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    // Lease reclaimed mid-flight; the item will be
                    // redelivered (at-least-once delivery).
                    warn!(id = %item.id, %locked_by, "lease lost before completion");
                }
                Err(err) => warn!(id = %item.id, %locked_by, error = %err, "complete failed"),
            },
            Err(reason) => {
                if let Err(err) = queue.report_error(&item, Some(&reason)).await {
                    warn!(id = %item.id, %locked_by, error = %err, "error report failed");
                }
            }
        }
    }
}
