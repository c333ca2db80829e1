//! Well-known environment variable names.
//!
//! These names are the external contract with the platform and the language
//! workers; they are read at startup and never reloaded.

/// Master switch for dynamic worker concurrency (truthy/falsy).
pub const DYNAMIC_CONCURRENCY_ENABLED: &str = "FUNCTIONS_WORKER_DYNAMIC_CONCURRENCY_ENABLED";

/// Explicit worker process count. Set non-empty, it disables dynamic scaling.
pub const WORKER_PROCESS_COUNT: &str = "FUNCTIONS_WORKER_PROCESS_COUNT";

/// The language runtime the host serves ("node", "java", "python", "powershell").
pub const WORKER_RUNTIME: &str = "FUNCTIONS_WORKER_RUNTIME";

/// Python worker thread-pool size. Set non-empty, it disables dynamic
/// scaling; when scaling is enabled the launcher pins it to 1.
pub const PYTHON_THREADPOOL_THREAD_COUNT: &str = "PYTHON_THREADPOOL_THREAD_COUNT";

/// PowerShell in-process concurrency upper bound. Same semantics as the
/// Python thread-pool variable.
pub const PSWORKER_INPROC_CONCURRENCY_UPPER_BOUND: &str = "PSWorkerInProcConcurrencyUpperBound";

/// Identifier handed to a launched worker process.
pub const WORKER_ID: &str = "POLYHOST_WORKER_ID";

/// Port a launched worker must serve its status endpoint on.
pub const WORKER_PORT: &str = "POLYHOST_WORKER_PORT";

/// Interpret an environment value as a boolean flag.
///
/// Only `"true"` and `"1"` (case-insensitive, trimmed) are truthy.
pub fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    v.eq_ignore_ascii_case("true") || v == "1"
}
