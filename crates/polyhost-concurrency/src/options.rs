//! Worker concurrency options and their startup-time setup.
//!
//! Options come from two sources, evaluated once: the process environment
//! decides whether the feature is on at all, and the `[worker_concurrency]`
//! config section overrides the numeric knobs. Nothing is reloaded at
//! runtime.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::bail;
use tracing::debug;

use polyhost_core::config::WorkerConcurrencyConfig;
use polyhost_core::duration::parse_duration;
use polyhost_core::env;

/// Tunables for the dynamic worker concurrency loop.
///
/// Immutable after startup; shared as `Arc<ConcurrencyOptions>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyOptions {
    /// Master switch. When false, monitors and the manager do nothing.
    pub enabled: bool,
    /// Tick period of every probe and of the manager.
    pub check_interval: Duration,
    /// Minimum wall time between two successive worker additions.
    pub adjustment_period: Duration,
    /// Sliding-window length per worker.
    pub history_size: usize,
    /// Fraction of window samples that must exceed `latency_threshold`
    /// for a worker to count as overloaded.
    pub history_threshold: f64,
    /// Per-sample latency threshold.
    pub latency_threshold: Duration,
    /// Hard cap on the worker pool. Zero means "derive from CPU count".
    pub max_worker_count: usize,
}

impl Default for ConcurrencyOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval: Duration::from_secs(1),
            adjustment_period: Duration::from_secs(10),
            history_size: 10,
            history_threshold: 1.0,
            latency_threshold: Duration::from_secs(1),
            max_worker_count: 0,
        }
    }
}

impl ConcurrencyOptions {
    /// Populate options from the environment and the config section.
    ///
    /// The environment wins: the feature stays off unless the master flag is
    /// truthy, and any explicit per-runtime concurrency setting turns it off
    /// again (the user has taken manual control). Only when enabled are the
    /// config overrides bound and validated.
    pub fn setup(
        env_vars: &HashMap<String, String>,
        config: Option<&WorkerConcurrencyConfig>,
    ) -> anyhow::Result<Self> {
        let mut options = Self::default();

        let master = env_vars
            .get(env::DYNAMIC_CONCURRENCY_ENABLED)
            .map(|v| env::is_truthy(v))
            .unwrap_or(false);
        if !master {
            return Ok(options);
        }

        // Explicit user control over worker counts or in-worker concurrency
        // wins over dynamic scaling.
        for name in [
            env::WORKER_PROCESS_COUNT,
            env::PYTHON_THREADPOOL_THREAD_COUNT,
            env::PSWORKER_INPROC_CONCURRENCY_UPPER_BOUND,
        ] {
            if env_vars.get(name).is_some_and(|v| !v.trim().is_empty()) {
                debug!(variable = name, "dynamic worker concurrency disabled by explicit setting");
                return Ok(options);
            }
        }

        options.enabled = true;

        if let Some(config) = config {
            if let Some(ref s) = config.check_interval {
                options.check_interval = parse_duration_field(s, "check_interval")?;
            }
            if let Some(ref s) = config.adjustment_period {
                options.adjustment_period = parse_duration_field(s, "adjustment_period")?;
            }
            if let Some(size) = config.history_size {
                options.history_size = size;
            }
            if let Some(threshold) = config.history_threshold {
                options.history_threshold = threshold;
            }
            if let Some(ref s) = config.latency_threshold {
                options.latency_threshold = parse_duration_field(s, "latency_threshold")?;
            }
            if let Some(max) = config.max_worker_count {
                options.max_worker_count = max;
            }
        }

        if options.history_size == 0 {
            bail!("worker_concurrency.history_size must be at least 1");
        }
        if options.history_threshold <= 0.0 || options.history_threshold > 1.0 {
            bail!(
                "worker_concurrency.history_threshold must be in (0, 1], got {}",
                options.history_threshold
            );
        }
        if options.check_interval.is_zero() {
            bail!("worker_concurrency.check_interval must be non-zero");
        }

        if options.max_worker_count == 0 {
            options.max_worker_count = derived_max_worker_count(effective_cores());
        }

        Ok(options)
    }
}

/// Default pool cap when none is configured.
pub(crate) fn derived_max_worker_count(cores: usize) -> usize {
    2 * cores + 2
}

fn effective_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_duration_field(value: &str, field: &str) -> anyhow::Result<Duration> {
    match parse_duration(value) {
        Some(d) => Ok(d),
        None => bail!("worker_concurrency.{field}: invalid duration {value:?}"),
    }
}
