//! Concurrency manager — the process-wide worker scaling loop.
//!
//! One manager per host. After a cold-start delay of one adjustment period
//! it ticks every `check_interval`: pull every worker's status from the
//! dispatcher, decide whether the pool is overloaded, and if so ask the
//! dispatcher for one more worker. Additions are spaced at least one
//! adjustment period apart so a freshly launched worker gets to affect the
//! latency signal before the next decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use polyhost_core::{FunctionDispatcher, WorkerId, WorkerStatus};

use crate::options::ConcurrencyOptions;

/// How often the per-worker state dump is logged absent a scale-up.
const LOG_STATE_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to the background control task.
struct ControlTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Scales the worker pool upward when probe latencies indicate overload.
pub struct ConcurrencyManager {
    options: Arc<ConcurrencyOptions>,
    dispatcher: Arc<dyn FunctionDispatcher>,
    task: Mutex<Option<ControlTask>>,
}

impl ConcurrencyManager {
    pub fn new(options: Arc<ConcurrencyOptions>, dispatcher: Arc<dyn FunctionDispatcher>) -> Self {
        Self {
            options,
            dispatcher,
            task: Mutex::new(None),
        }
    }

    /// Start the control loop.
    ///
    /// Returns immediately. Does nothing when dynamic concurrency is
    /// disabled, and the spawned loop exits on its own if the dispatcher
    /// cannot grow its pool (HTTP workers).
    pub async fn start(&self) {
        if !self.options.enabled {
            info!("dynamic worker concurrency is disabled");
            return;
        }

        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_control_loop(
            self.options.clone(),
            self.dispatcher.clone(),
            shutdown_rx,
        ));
        *task = Some(ControlTask {
            handle,
            shutdown_tx,
        });
    }

    /// Signal the control loop to stop. An in-flight tick completes.
    /// Safe if the manager was never started.
    pub async fn stop(&self) {
        let task = self.task.lock().await;
        if let Some(ref task) = *task {
            let _ = task.shutdown_tx.send(true);
        }
    }

    /// Tear down the control task.
    pub async fn dispose(&self) {
        let mut task = self.task.lock().await;
        if let Some(task) = task.take() {
            let _ = task.shutdown_tx.send(true);
            task.handle.abort();
        }
    }

    /// Whether the control task currently exists.
    pub async fn is_running(&self) -> bool {
        let task = self.task.lock().await;
        task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }
}

async fn run_control_loop(
    options: Arc<ConcurrencyOptions>,
    dispatcher: Arc<dyn FunctionDispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    // `last_add` dates from startup, and the loop sleeps one adjustment
    // period before its first decision, so a freshly booted pool is never
    // scaled while it warms up.
    let mut last_add = Instant::now();

    tokio::select! {
        _ = tokio::time::sleep(options.adjustment_period) => {}
        _ = shutdown.changed() => return,
    }

    if !dispatcher.supports_dynamic_concurrency() {
        warn!("dispatcher does not support dynamic worker concurrency; scaling loop will not run");
        return;
    }

    info!(
        check_interval = ?options.check_interval,
        adjustment_period = ?options.adjustment_period,
        max_worker_count = options.max_worker_count,
        "worker concurrency manager started"
    );

    let mut last_state_log = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(options.check_interval) => {
                if let Err(e) = tick(&*dispatcher, &options, &mut last_add, &mut last_state_log).await {
                    error!(error = %e, "worker concurrency tick failed");
                }
            }
            _ = shutdown.changed() => {
                info!("worker concurrency manager shutting down");
                break;
            }
        }
    }
}

/// One pass of the control loop.
///
/// Errors from the dispatcher bubble up to be logged by the loop; a failed
/// worker start leaves `last_add` untouched so the next eligible tick
/// retries.
async fn tick(
    dispatcher: &dyn FunctionDispatcher,
    options: &ConcurrencyOptions,
    last_add: &mut Instant,
    last_state_log: &mut Instant,
) -> anyhow::Result<()> {
    let statuses = dispatcher.worker_statuses().await?;
    let add = should_add_worker(&statuses, last_add.elapsed(), options);

    if add || last_state_log.elapsed() >= LOG_STATE_INTERVAL {
        log_worker_state(&statuses, options);
        *last_state_log = Instant::now();
    }

    if add {
        dispatcher.start_worker_channel().await?;
        *last_add = Instant::now();
        debug!(workers = statuses.len() + 1, "new worker is added");
    }

    Ok(())
}

/// The scale-up decision.
///
/// True iff the cooldown since the last addition has elapsed, every worker
/// has finished initializing, the pool is below its cap, and at least one
/// worker's latency window shows overload.
fn should_add_worker(
    statuses: &HashMap<WorkerId, WorkerStatus>,
    since_last_add: Duration,
    options: &ConcurrencyOptions,
) -> bool {
    if since_last_add < options.adjustment_period {
        return false;
    }
    if statuses.values().any(|s| !s.is_ready) {
        return false;
    }
    if statuses.len() >= options.max_worker_count {
        return false;
    }
    statuses
        .values()
        .any(|s| is_overloaded(&s.latency_history, options))
}

/// Whether a single worker's window shows overload.
///
/// A window shorter than `history_size` is never overloaded. Both
/// comparisons are inclusive: a sample equal to the latency threshold
/// counts, and a fraction equal to the history threshold trips.
fn is_overloaded(history: &[Duration], options: &ConcurrencyOptions) -> bool {
    if history.len() < options.history_size {
        return false;
    }
    let over = history
        .iter()
        .filter(|l| **l >= options.latency_threshold)
        .count();
    over as f64 / options.history_size as f64 >= options.history_threshold
}

/// Dump every worker's window at debug level.
fn log_worker_state(statuses: &HashMap<WorkerId, WorkerStatus>, options: &ConcurrencyOptions) {
    for (worker_id, status) in statuses {
        let history = &status.latency_history;
        let avg_ms = if history.is_empty() {
            0.0
        } else {
            history.iter().map(|l| l.as_secs_f64() * 1000.0).sum::<f64>() / history.len() as f64
        };
        let max_ms = history
            .iter()
            .map(|l| l.as_secs_f64() * 1000.0)
            .fold(0.0, f64::max);

        debug!(
            %worker_id,
            ready = status.is_ready,
            overloaded = is_overloaded(history, options),
            samples = history.len(),
            avg_ms,
            max_ms,
            history = ?history,
            "worker status"
        );
    }
}
