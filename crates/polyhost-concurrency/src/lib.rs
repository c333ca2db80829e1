//! polyhost-concurrency — dynamic worker scaling for the function host.
//!
//! Language workers serve invocations with a bounded in-process concurrency,
//! so a host that sees rising probe latency grows the pool by launching more
//! worker processes, up to a cap. This crate is the decision side of that:
//! per-worker latency windows and the process-wide control loop.
//!
//! # Architecture
//!
//! ```text
//! ConcurrencyManager (one per host)
//!   ├── waits one adjustment_period, then ticks every check_interval
//!   ├── FunctionDispatcher::worker_statuses() → {worker → status}
//!   ├── should_add_worker() — pure decision predicate
//!   └── FunctionDispatcher::start_worker_channel() on scale-up
//!
//! WorkerChannelMonitor (one per worker, owned by the dispatcher)
//!   ├── probes WorkerChannel::get_status() every check_interval
//!   └── bounded latency window, surfaced via stats()
//! ```
//!
//! Scale-down never happens here; draining workers is the platform's job.
//! Every background loop is sleep-run-repeat, so a slow probe or a slow
//! worker launch can never pile ticks on top of each other.

pub mod manager;
pub mod monitor;
pub mod options;

pub use manager::ConcurrencyManager;
pub use monitor::WorkerChannelMonitor;
pub use options::ConcurrencyOptions;
