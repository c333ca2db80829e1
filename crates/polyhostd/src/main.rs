//! polyhostd — the polyhost function host daemon.
//!
//! Launches a pool of out-of-process language workers, monitors their
//! status latency, and grows the pool under load when dynamic worker
//! concurrency is enabled.
//!
//! # Usage
//!
//! ```text
//! polyhostd --runtime node --initial-workers 1 --worker-port-base 7100
//! polyhostd --config polyhost.toml
//! polyhostd --http-worker
//! ```
//!
//! Dynamic concurrency is governed by the environment: set
//! `FUNCTIONS_WORKER_DYNAMIC_CONCURRENCY_ENABLED=true` to turn it on, and
//! tune it via the `[worker_concurrency]` section of the config file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use polyhost_concurrency::{ConcurrencyManager, ConcurrencyOptions};
use polyhost_core::{FunctionDispatcher, HostConfig, RuntimeKind};
use polyhost_dispatch::{
    HttpFunctionDispatcher, LauncherConfig, ProcessChannelFactory, RpcFunctionDispatcher,
    WorkerLauncher,
};

#[derive(Parser)]
#[command(name = "polyhostd", about = "polyhost function host daemon")]
struct Cli {
    /// Path to the host configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker runtime: node, java, python, powershell.
    #[arg(long, default_value = "node")]
    runtime: String,

    /// Number of workers launched at startup.
    #[arg(long, default_value = "1")]
    initial_workers: u32,

    /// First port handed to a worker's status endpoint.
    #[arg(long, default_value = "7100")]
    worker_port_base: u16,

    /// Serve HTTP-based workers (no dynamic concurrency).
    #[arg(long)]
    http_worker: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,polyhostd=debug,polyhost=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let config = HostConfig::from_file(path)?;
            info!(path = ?path, "host configuration loaded");
            config
        }
        None => HostConfig::default(),
    };
    let host = config.host.clone().unwrap_or_default();

    let env_vars: HashMap<String, String> = std::env::vars().collect();
    let options = Arc::new(ConcurrencyOptions::setup(
        &env_vars,
        config.worker_concurrency.as_ref(),
    )?);
    info!(
        enabled = options.enabled,
        max_worker_count = options.max_worker_count,
        "worker concurrency options resolved"
    );

    let runtime = RuntimeKind::from_str(host.runtime.as_deref().unwrap_or(&cli.runtime))?;
    let initial_workers = host.initial_workers.unwrap_or(cli.initial_workers);
    let port_base = host.worker_port_base.unwrap_or(cli.worker_port_base);

    // ── Build the dispatcher ───────────────────────────────────────

    let mut rpc_dispatcher: Option<Arc<RpcFunctionDispatcher>> = None;
    let mut factory_handle: Option<Arc<ProcessChannelFactory>> = None;

    let dispatcher: Arc<dyn FunctionDispatcher> = if cli.http_worker {
        info!("running with http workers");
        Arc::new(HttpFunctionDispatcher)
    } else {
        let mut launcher_config = LauncherConfig::new(runtime);
        launcher_config.command = host.worker_command.clone();
        launcher_config.args = host.worker_args.clone().unwrap_or_default();
        launcher_config.dynamic_concurrency = options.enabled;

        let factory = Arc::new(ProcessChannelFactory::new(
            WorkerLauncher::new(launcher_config),
            port_base,
        ));
        let dispatcher = Arc::new(RpcFunctionDispatcher::new(
            runtime,
            options.clone(),
            factory.clone(),
        ));

        for _ in 0..initial_workers {
            dispatcher.start_worker_channel().await?;
        }
        info!(%runtime, workers = initial_workers, "worker pool started");

        factory_handle = Some(factory);
        rpc_dispatcher = Some(dispatcher.clone());
        dispatcher
    };

    // ── Start the concurrency manager ──────────────────────────────

    let manager = ConcurrencyManager::new(options, dispatcher);
    manager.start().await;

    // ── Run until shutdown ─────────────────────────────────────────

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    manager.stop().await;
    manager.dispose().await;
    if let Some(dispatcher) = rpc_dispatcher {
        dispatcher.shutdown().await;
    }
    if let Some(factory) = factory_handle {
        factory.shutdown().await;
    }

    info!("polyhost daemon stopped");
    Ok(())
}
