//! Contracts between the scaling loop and the rest of the host.
//!
//! The concurrency manager never touches transports or processes directly:
//! it reads worker snapshots from a `FunctionDispatcher` and asks it to grow
//! the pool. Monitors probe workers through a `WorkerChannel`. Both are
//! trait objects so the dispatch layer can swap transports without touching
//! the control loop.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::{WorkerId, WorkerStatus};

/// A single worker reachable over RPC.
#[async_trait]
pub trait WorkerChannel: Send + Sync {
    /// The worker's identifier within the host process.
    fn worker_id(&self) -> &str;

    /// Measure one status round-trip against the worker.
    ///
    /// Returns a single-probe `WorkerStatus` (empty history). Must be safe
    /// to call while invocations are in flight. Failures are expected while
    /// the channel is shutting down; callers treat them as a skipped sample.
    async fn get_status(&self) -> anyhow::Result<WorkerStatus>;
}

/// The host component that owns the worker pool.
#[async_trait]
pub trait FunctionDispatcher: Send + Sync {
    /// Whether this dispatcher can grow its pool on demand.
    ///
    /// The HTTP-worker dispatcher reports `false`; the scaling loop refuses
    /// to run against it.
    fn supports_dynamic_concurrency(&self) -> bool;

    /// Snapshot every worker's status, history included.
    async fn worker_statuses(&self) -> anyhow::Result<HashMap<WorkerId, WorkerStatus>>;

    /// Launch one additional worker. Resolves once the worker is added.
    async fn start_worker_channel(&self) -> anyhow::Result<()>;
}
