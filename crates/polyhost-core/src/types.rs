//! Domain types shared across the host.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier for a worker channel within the host process.
pub type WorkerId = String;

/// Snapshot of a single worker's health as seen by the host.
///
/// A channel's `get_status()` produces one of these per probe with an empty
/// `latency_history` (the probe's own round-trip in `latency`). The
/// dispatcher merges in the monitor's current window before handing the
/// status to the scaling loop, oldest sample first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Worker has completed initialization and may serve invocations.
    pub is_ready: bool,
    /// Round-trip time of the most recent probe.
    pub latency: Duration,
    /// Bounded window of recent probe latencies, oldest first.
    pub latency_history: Vec<Duration>,
}

impl WorkerStatus {
    /// A single-probe status with no history attached.
    pub fn probe(is_ready: bool, latency: Duration) -> Self {
        Self {
            is_ready,
            latency,
            latency_history: Vec::new(),
        }
    }
}

/// The language runtime a worker process hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    Node,
    Java,
    Python,
    PowerShell,
}

impl RuntimeKind {
    /// The default executable used to launch a worker of this runtime.
    pub fn executable(&self) -> &'static str {
        match self {
            RuntimeKind::Node => "node",
            RuntimeKind::Java => "java",
            RuntimeKind::Python => "python",
            RuntimeKind::PowerShell => "pwsh",
        }
    }

    /// The runtime name as it appears in `FUNCTIONS_WORKER_RUNTIME`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Node => "node",
            RuntimeKind::Java => "java",
            RuntimeKind::Python => "python",
            RuntimeKind::PowerShell => "powershell",
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "node" => Ok(RuntimeKind::Node),
            "java" => Ok(RuntimeKind::Java),
            "python" => Ok(RuntimeKind::Python),
            "powershell" => Ok(RuntimeKind::PowerShell),
            other => anyhow::bail!("unknown worker runtime: {other}"),
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
