//! Worker channel monitor — per-worker latency window driven by a probe loop.
//!
//! One monitor per worker channel, owned by the dispatcher alongside the
//! channel itself. The monitor probes the worker's status endpoint every
//! `check_interval` and keeps the last `history_size` round-trip times.
//! The next probe is armed only after the previous one completes, so probes
//! never overlap no matter how slow the worker is.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use polyhost_core::{WorkerChannel, WorkerStatus};

use crate::options::ConcurrencyOptions;

/// Handle to the background probe task.
struct ProbeTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Maintains a bounded, time-ordered history of probe latencies for exactly
/// one worker channel.
pub struct WorkerChannelMonitor {
    channel: Arc<dyn WorkerChannel>,
    options: Arc<ConcurrencyOptions>,
    history: Arc<Mutex<VecDeque<Duration>>>,
    /// Readiness reported by the most recent successful probe.
    last_ready: Arc<AtomicBool>,
    task: Mutex<Option<ProbeTask>>,
    disposed: AtomicBool,
}

impl WorkerChannelMonitor {
    pub fn new(channel: Arc<dyn WorkerChannel>, options: Arc<ConcurrencyOptions>) -> Self {
        Self {
            channel,
            options,
            history: Arc::new(Mutex::new(VecDeque::new())),
            last_ready: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Start the probe loop if it is not already running.
    ///
    /// A no-op when dynamic concurrency is disabled, and idempotent
    /// otherwise: at most one probe task ever exists per monitor.
    pub async fn ensure_started(&self) {
        if !self.options.enabled || self.disposed.load(Ordering::Relaxed) {
            return;
        }

        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_probe_loop(
            self.channel.clone(),
            self.options.clone(),
            self.history.clone(),
            self.last_ready.clone(),
            shutdown_rx,
        ));
        *task = Some(ProbeTask {
            handle,
            shutdown_tx,
        });

        debug!(worker_id = %self.channel.worker_id(), "worker status monitor started");
    }

    /// Snapshot the worker's status, history included.
    ///
    /// Lazily starts the probe loop. The returned history is a copy, oldest
    /// sample first; `latency` is the most recent sample.
    pub async fn stats(&self) -> WorkerStatus {
        self.ensure_started().await;

        let history = self.history.lock().await;
        WorkerStatus {
            is_ready: self.last_ready.load(Ordering::Relaxed),
            latency: history.back().copied().unwrap_or_default(),
            latency_history: history.iter().copied().collect(),
        }
    }

    /// Stop the probe loop. Safe to call repeatedly and before start; a
    /// disposed monitor stays stopped even if `stats()` is called again.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::Relaxed);
        let mut task = self.task.lock().await;
        if let Some(task) = task.take() {
            let _ = task.shutdown_tx.send(true);
            task.handle.abort();
            debug!(worker_id = %self.channel.worker_id(), "worker status monitor stopped");
        }
    }
}

/// The probe loop for a single worker channel.
///
/// Probe failures are swallowed: they are routine while the channel is
/// shutting down, and a missed sample simply leaves the window one short.
async fn run_probe_loop(
    channel: Arc<dyn WorkerChannel>,
    options: Arc<ConcurrencyOptions>,
    history: Arc<Mutex<VecDeque<Duration>>>,
    last_ready: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(options.check_interval) => {
                match channel.get_status().await {
                    Ok(status) => {
                        last_ready.store(status.is_ready, Ordering::Relaxed);
                        let mut history = history.lock().await;
                        if history.len() >= options.history_size {
                            history.pop_front();
                        }
                        history.push_back(status.latency);
                    }
                    Err(e) => {
                        debug!(
                            worker_id = %channel.worker_id(),
                            error = %e,
                            "worker status probe failed"
                        );
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Channel stub with a held latency value and optional failure mode.
    struct FakeChannel {
        ready: AtomicBool,
        latency: Mutex<Duration>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeChannel {
        fn new(latency: Duration) -> Self {
            Self {
                ready: AtomicBool::new(true),
                latency: Mutex::new(latency),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl WorkerChannel for FakeChannel {
        fn worker_id(&self) -> &str {
            "worker-0"
        }

        async fn get_status(&self) -> anyhow::Result<WorkerStatus> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail.load(Ordering::Relaxed) {
                anyhow::bail!("channel is shutting down");
            }
            Ok(WorkerStatus::probe(
                self.ready.load(Ordering::Relaxed),
                *self.latency.lock().await,
            ))
        }
    }

    fn fast_options(history_size: usize) -> Arc<ConcurrencyOptions> {
        Arc::new(ConcurrencyOptions {
            enabled: true,
            check_interval: Duration::from_millis(10),
            history_size,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn history_never_exceeds_window_size() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(3)));
        let monitor = WorkerChannelMonitor::new(channel.clone(), fast_options(3));

        monitor.ensure_started().await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let stats = monitor.stats().await;
        assert_eq!(stats.latency_history.len(), 3);
        assert!(channel.calls() > 3, "probe loop should keep running");
        monitor.dispose().await;
    }

    #[tokio::test]
    async fn disabled_monitor_never_probes() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(3)));
        let options = Arc::new(ConcurrencyOptions::default());
        let monitor = WorkerChannelMonitor::new(channel.clone(), options);

        monitor.ensure_started().await;
        let stats = monitor.stats().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(stats.latency_history.is_empty());
        assert!(!stats.is_ready);
        assert_eq!(channel.calls(), 0);
    }

    #[tokio::test]
    async fn ensure_started_is_idempotent() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(1)));
        let options = Arc::new(ConcurrencyOptions {
            enabled: true,
            check_interval: Duration::from_millis(40),
            ..Default::default()
        });
        let monitor = WorkerChannelMonitor::new(channel.clone(), options);

        monitor.ensure_started().await;
        monitor.ensure_started().await;
        monitor.ensure_started().await;
        tokio::time::sleep(Duration::from_millis(210)).await;

        // A single 40ms timer fits at most ~5 probes in 210ms; duplicated
        // timers would roughly double that.
        assert!(
            channel.calls() <= 6,
            "expected one probe loop, saw {} probes",
            channel.calls()
        );
        monitor.dispose().await;
    }

    #[tokio::test]
    async fn stats_lazily_starts_the_probe_loop() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(7)));
        let monitor = WorkerChannelMonitor::new(channel.clone(), fast_options(10));

        let first = monitor.stats().await;
        assert!(first.latency_history.is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let later = monitor.stats().await;
        assert!(!later.latency_history.is_empty());
        assert_eq!(later.latency, Duration::from_millis(7));
        assert!(later.is_ready);
        monitor.dispose().await;
    }

    #[tokio::test]
    async fn probe_failures_are_swallowed() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(2)));
        let monitor = WorkerChannelMonitor::new(channel.clone(), fast_options(10));

        monitor.ensure_started().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = monitor.stats().await.latency_history.len();
        assert!(before > 0);

        channel.fail.store(true, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // No samples appended while failing, but the loop is still alive.
        let during = monitor.stats().await.latency_history.len();
        assert_eq!(during, before);

        channel.fail.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.stats().await.latency_history.len() > during);
        monitor.dispose().await;
    }

    #[tokio::test]
    async fn readiness_tracks_latest_probe() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(2)));
        channel.ready.store(false, Ordering::Relaxed);
        let monitor = WorkerChannelMonitor::new(channel.clone(), fast_options(10));

        monitor.ensure_started().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!monitor.stats().await.is_ready);

        channel.ready.store(true, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.stats().await.is_ready);
        monitor.dispose().await;
    }

    #[tokio::test]
    async fn dispose_stops_probing_and_is_idempotent() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(2)));
        let monitor = WorkerChannelMonitor::new(channel.clone(), fast_options(10));

        monitor.ensure_started().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        monitor.dispose().await;
        monitor.dispose().await;

        let after_dispose = channel.calls();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(channel.calls(), after_dispose);
    }

    #[tokio::test]
    async fn stats_after_dispose_does_not_restart() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(2)));
        let monitor = WorkerChannelMonitor::new(channel.clone(), fast_options(10));

        monitor.ensure_started().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.dispose().await;

        let after_dispose = channel.calls();
        let _ = monitor.stats().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(channel.calls(), after_dispose);
    }

    #[tokio::test]
    async fn dispose_before_start_is_safe() {
        let channel = Arc::new(FakeChannel::new(Duration::from_millis(2)));
        let monitor = WorkerChannelMonitor::new(channel, fast_options(10));
        monitor.dispose().await;
    }
}
