//! polyhost-dispatch — worker processes and the dispatchers that own them.
//!
//! The dispatcher owns the worker pool: it launches worker processes,
//! wraps each one in a status channel and a latency monitor, and grows the
//! pool when the concurrency manager asks. The manager itself never sees
//! processes or transports, only the `FunctionDispatcher` contract.
//!
//! # Architecture
//!
//! ```text
//! RpcFunctionDispatcher
//!   ├── WorkerChannelFactory ── WorkerLauncher (process + env)
//!   │                           └── HttpStatusChannel (status probe)
//!   └── per worker: WorkerChannelMonitor (latency window)
//!
//! HttpFunctionDispatcher — refuses dynamic concurrency
//! ```

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod launcher;

pub use channel::{HttpStatusChannel, ProcessChannelFactory, WorkerChannelFactory};
pub use dispatcher::{HttpFunctionDispatcher, RpcFunctionDispatcher};
pub use error::DispatchError;
pub use launcher::{LauncherConfig, WorkerLauncher, WorkerProcess};
