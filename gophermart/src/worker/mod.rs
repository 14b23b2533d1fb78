//! Worker pool (C8): N parallel shard workers covering `[0, shard_count)` disjointly.
mod rate_limiter;
mod shard_worker;

pub use shard_worker::ShardWorker;

use crate::{shard, store::Store};
use shared::accrual_client::AccrualApi;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};

pub struct WorkerPool;

impl WorkerPool {
    /// Spawns one long-lived task per shard range. `cancellation` is watched between
    /// iterations; setting it to `true` lets every worker finish its current iteration and
    /// exit, never abandoning an in-flight HTTP call or commit.
    pub fn spawn(
        worker_count: u32,
        shard_count: u32,
        store: Arc<dyn Store>,
        accrual: Arc<dyn AccrualApi>,
        cancellation: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        shard::worker_ranges(worker_count, shard_count)
            .into_iter()
            .map(|(from, to)| {
                let worker = ShardWorker::new(from, to, store.clone(), accrual.clone());
                let cancellation = cancellation.clone();
                tokio::spawn(async move {
                    tracing::info!(from, to, "worker starting");
                    worker.run(cancellation).await;
                })
            })
            .collect()
    }
}
