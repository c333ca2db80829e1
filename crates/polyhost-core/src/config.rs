//! polyhost.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level host configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    pub host: Option<HostSection>,
    pub worker_concurrency: Option<WorkerConcurrencyConfig>,
}

/// General host settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSection {
    /// Worker runtime ("node", "java", "python", "powershell").
    pub runtime: Option<String>,
    /// Number of workers launched at startup.
    pub initial_workers: Option<u32>,
    /// First port handed to a worker's status endpoint.
    pub worker_port_base: Option<u16>,
    /// Override for the worker launch command.
    pub worker_command: Option<String>,
    /// Arguments passed to the worker launch command.
    pub worker_args: Option<Vec<String>>,
}

/// The `[worker_concurrency]` section.
///
/// Durations are strings in either suffix form (`"1s"`, `"500ms"`) or clock
/// form (`"00:00:03"`). Unset fields keep their built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConcurrencyConfig {
    pub check_interval: Option<String>,
    pub adjustment_period: Option<String>,
    pub history_size: Option<usize>,
    pub history_threshold: Option<f64>,
    pub latency_threshold: Option<String>,
    pub max_worker_count: Option<usize>,
}

impl HostConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
