//! Function dispatchers — owners of the worker pool.
//!
//! `RpcFunctionDispatcher` composes one monitor per worker channel and can
//! grow the pool on request; its `worker_statuses` reads monitor snapshots
//! only, never a live RPC, so the scaling loop's tick stays cheap.
//! `HttpFunctionDispatcher` is the variant for HTTP-based workers, which
//! the scaling loop must refuse to grow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use polyhost_concurrency::{ConcurrencyOptions, WorkerChannelMonitor};
use polyhost_core::{FunctionDispatcher, RuntimeKind, WorkerId, WorkerStatus};

use crate::channel::WorkerChannelFactory;
use crate::error::DispatchError;

/// Per-worker state owned by the dispatcher.
struct WorkerSlot {
    monitor: WorkerChannelMonitor,
}

/// Dispatcher for RPC language workers.
pub struct RpcFunctionDispatcher {
    runtime: RuntimeKind,
    options: Arc<ConcurrencyOptions>,
    factory: Arc<dyn WorkerChannelFactory>,
    /// Active workers: worker id → slot.
    workers: RwLock<HashMap<WorkerId, WorkerSlot>>,
    next_index: AtomicUsize,
}

impl RpcFunctionDispatcher {
    pub fn new(
        runtime: RuntimeKind,
        options: Arc<ConcurrencyOptions>,
        factory: Arc<dyn WorkerChannelFactory>,
    ) -> Self {
        Self {
            runtime,
            options,
            factory,
            workers: RwLock::new(HashMap::new()),
            next_index: AtomicUsize::new(0),
        }
    }

    /// Number of workers currently in the pool.
    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Stop every monitor and forget the workers.
    pub async fn shutdown(&self) {
        let mut workers = self.workers.write().await;
        for (worker_id, slot) in workers.drain() {
            slot.monitor.dispose().await;
            debug!(%worker_id, "worker channel removed");
        }
        info!("function dispatcher shut down");
    }
}

#[async_trait]
impl FunctionDispatcher for RpcFunctionDispatcher {
    fn supports_dynamic_concurrency(&self) -> bool {
        true
    }

    async fn worker_statuses(&self) -> anyhow::Result<HashMap<WorkerId, WorkerStatus>> {
        let workers = self.workers.read().await;
        let mut statuses = HashMap::with_capacity(workers.len());
        for (worker_id, slot) in workers.iter() {
            statuses.insert(worker_id.clone(), slot.monitor.stats().await);
        }
        Ok(statuses)
    }

    async fn start_worker_channel(&self) -> anyhow::Result<()> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let worker_id = format!("{}-worker-{}", self.runtime, index);

        let channel = self.factory.create(&worker_id).await?;
        let monitor = WorkerChannelMonitor::new(channel, self.options.clone());
        monitor.ensure_started().await;

        let mut workers = self.workers.write().await;
        workers.insert(worker_id.clone(), WorkerSlot { monitor });
        info!(%worker_id, workers = workers.len(), "worker channel started");
        Ok(())
    }
}

/// Dispatcher for HTTP-based workers.
///
/// HTTP workers manage their own concurrency; the host never grows the
/// pool for them.
pub struct HttpFunctionDispatcher;

#[async_trait]
impl FunctionDispatcher for HttpFunctionDispatcher {
    fn supports_dynamic_concurrency(&self) -> bool {
        false
    }

    async fn worker_statuses(&self) -> anyhow::Result<HashMap<WorkerId, WorkerStatus>> {
        Ok(HashMap::new())
    }

    async fn start_worker_channel(&self) -> anyhow::Result<()> {
        Err(DispatchError::HttpUnsupported.into())
    }
}
