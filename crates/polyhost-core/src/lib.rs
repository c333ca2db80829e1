//! polyhost-core — shared types and contracts for the polyhost function host.
//!
//! The host runs user functions in out-of-process language workers (Node,
//! Java, Python, PowerShell) reached over RPC. This crate holds the pieces
//! every other crate needs: the worker status types, the dispatcher and
//! channel contracts consumed by the scaling loop, the host configuration
//! file format, and the well-known environment variable names.

pub mod config;
pub mod contract;
pub mod duration;
pub mod env;
pub mod types;

pub use config::{HostConfig, HostSection, WorkerConcurrencyConfig};
pub use contract::{FunctionDispatcher, WorkerChannel};
pub use duration::parse_duration;
pub use types::{RuntimeKind, WorkerId, WorkerStatus};
