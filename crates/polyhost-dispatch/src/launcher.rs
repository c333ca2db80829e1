//! Worker process launcher.
//!
//! Builds the environment handed to a language worker and spawns the
//! process. When dynamic concurrency is enabled, the per-runtime in-process
//! concurrency caps are pinned to 1: the host scales horizontally with more
//! processes, so each worker must stay single-concurrency.

use std::collections::HashMap;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use polyhost_core::env;
use polyhost_core::RuntimeKind;

use crate::error::DispatchResult;

/// Configuration for launching worker processes.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// The language runtime the workers host.
    pub runtime: RuntimeKind,
    /// Override for the launch command; defaults to the runtime's executable.
    pub command: Option<String>,
    /// Arguments passed to the launch command.
    pub args: Vec<String>,
    /// Extra environment passed through to every worker.
    pub env: HashMap<String, String>,
    /// Whether dynamic worker concurrency is enabled for this host.
    pub dynamic_concurrency: bool,
}

impl LauncherConfig {
    pub fn new(runtime: RuntimeKind) -> Self {
        Self {
            runtime,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            dynamic_concurrency: false,
        }
    }
}

/// A launched worker process. Killed on drop.
pub struct WorkerProcess {
    pub worker_id: String,
    child: Child,
}

impl WorkerProcess {
    /// Kill the process and reap it.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(worker_id = %self.worker_id, error = %e, "worker process already gone");
        }
    }
}

/// Spawns worker processes with the host-assigned identity and environment.
pub struct WorkerLauncher {
    config: LauncherConfig,
}

impl WorkerLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    /// The command used to start a worker.
    pub fn effective_command(&self) -> &str {
        self.config
            .command
            .as_deref()
            .unwrap_or_else(|| self.config.runtime.executable())
    }

    /// The full environment for one worker.
    ///
    /// Always carries the worker's identity and status port; under dynamic
    /// concurrency the runtime-specific concurrency caps are pinned to 1.
    pub fn worker_env(&self, worker_id: &str, port: u16) -> HashMap<String, String> {
        let mut vars = self.config.env.clone();
        vars.insert(env::WORKER_ID.to_string(), worker_id.to_string());
        vars.insert(env::WORKER_PORT.to_string(), port.to_string());
        vars.insert(
            env::WORKER_RUNTIME.to_string(),
            self.config.runtime.as_str().to_string(),
        );

        if self.config.dynamic_concurrency {
            match self.config.runtime {
                RuntimeKind::Python => {
                    vars.insert(env::PYTHON_THREADPOOL_THREAD_COUNT.to_string(), "1".to_string());
                }
                RuntimeKind::PowerShell => {
                    vars.insert(
                        env::PSWORKER_INPROC_CONCURRENCY_UPPER_BOUND.to_string(),
                        "1".to_string(),
                    );
                }
                RuntimeKind::Node | RuntimeKind::Java => {}
            }
        }

        vars
    }

    /// Spawn one worker process.
    pub fn launch(&self, worker_id: &str, port: u16) -> DispatchResult<WorkerProcess> {
        let command = self.effective_command().to_string();
        let child = Command::new(&command)
            .args(&self.config.args)
            .envs(self.worker_env(worker_id, port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        info!(
            %worker_id,
            runtime = %self.config.runtime,
            %command,
            port,
            "worker process launched"
        );

        Ok(WorkerProcess {
            worker_id: worker_id.to_string(),
            child,
        })
    }
}
