//! Demo driver: an in-memory queue, a worker group, and the reaper.
//!
//! Seeds a batch of items at mixed priorities (some flaky, so the retry path
//! runs), waits for the workers to drain the queue, and prints the final
//! stats snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leaseq_core::{
    InMemoryStore, ItemHandler, Queue, QueueConfig, QueueError, Reaper, WorkItem, WorkerGroup,
};

#[derive(Debug, Parser)]
#[command(name = "leaseq", about = "Run a demo work queue in memory")]
struct Args {
    /// Number of concurrent workers.
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Number of items to seed.
    #[arg(long, default_value_t = 12)]
    items: usize,

    /// Lease timeout in seconds.
    #[arg(long, default_value_t = 30)]
    lease_timeout: u64,

    /// Attempts before an item is parked as an error.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Worker poll interval in milliseconds when the queue is empty.
    #[arg(long, default_value_t = 25)]
    poll_interval_ms: u64,
}

/// Fails every flagged item on its first attempt, then lets it through.
struct DemoHandler;

#[async_trait]
impl ItemHandler for DemoHandler {
    async fn process(&self, item: &WorkItem) -> Result<(), String> {
        let flaky = item
            .payload
            .get("flaky")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if flaky && item.attempts == 0 {
            return Err("first attempt always fails".to_string());
        }

        let message = item
            .payload
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("<none>");
        info!(id = %item.id, priority = item.priority, message, "processed item");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), QueueError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = QueueConfig {
        lease_timeout: Duration::from_secs(args.lease_timeout),
        max_attempts: args.max_attempts,
        ..QueueConfig::default()
    };
    info!(
        collection = %config.collection,
        lease_timeout_secs = args.lease_timeout,
        max_attempts = args.max_attempts,
        "starting demo queue"
    );

    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(Queue::new(store, config));

    for i in 0..args.items {
        let mut fields = serde_json::Map::new();
        fields.insert("priority".to_string(), json!((i % 3) as i64));
        fields.insert("message".to_string(), json!(format!("job-{i}")));
        // Every fourth item fails its first attempt to exercise retries.
        fields.insert("flaky".to_string(), json!(i % 4 == 0));
        queue.insert(fields).await?;
    }

    let workers = WorkerGroup::spawn(
        args.workers,
        "demo",
        Arc::clone(&queue),
        Arc::new(DemoHandler),
        Duration::from_millis(args.poll_interval_ms),
    );
    let reaper = Reaper::spawn(Arc::clone(&queue), Duration::from_secs(1));

    loop {
        let stats = queue.stats().await?;
        info!(
            available = stats.available,
            locked = stats.locked,
            errors = stats.errors,
            total = stats.total,
            "queue status"
        );
        if stats.available == 0 && stats.locked == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    workers.shutdown_and_join().await;
    reaper.shutdown_and_join().await;

    let stats = queue.stats().await?;
    println!(
        "done: {} completed, {} parked as errors",
        args.items as u64 - stats.total,
        stats.errors
    );
    Ok(())
}
