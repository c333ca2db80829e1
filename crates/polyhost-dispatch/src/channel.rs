//! Worker status channels.
//!
//! A status probe is a timed HTTP/1 GET against the worker's status
//! endpoint: the round-trip elapsed time is the latency sample, a 2xx
//! response means the worker is ready. Connection failures and timeouts
//! surface as errors; the monitor treats them as skipped samples.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use polyhost_core::{WorkerChannel, WorkerStatus};

use crate::launcher::{WorkerLauncher, WorkerProcess};

/// Default per-probe timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Path the worker serves its status on.
const STATUS_PATH: &str = "/status";

/// Probes one worker's status endpoint over HTTP/1.
pub struct HttpStatusChannel {
    worker_id: String,
    /// The worker's listen address (ip:port).
    address: String,
    timeout: Duration,
}

impl HttpStatusChannel {
    pub fn new(worker_id: impl Into<String>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            worker_id: worker_id.into(),
            address: address.into(),
            timeout,
        }
    }

    async fn probe(&self) -> anyhow::Result<bool> {
        let uri = format!("http://{}{}", self.address, STATUS_PATH);

        let stream = tokio::net::TcpStream::connect(&self.address).await?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", &self.address)
            .header("user-agent", "polyhost/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        if !resp.status().is_success() {
            debug!(worker_id = %self.worker_id, status = %resp.status(), "worker status non-2xx");
        }
        Ok(resp.status().is_success())
    }
}

#[async_trait]
impl WorkerChannel for HttpStatusChannel {
    fn worker_id(&self) -> &str {
        &self.worker_id
    }

    async fn get_status(&self) -> anyhow::Result<WorkerStatus> {
        let started = Instant::now();
        let is_ready = tokio::time::timeout(self.timeout, self.probe())
            .await
            .map_err(|_| anyhow::anyhow!("status probe timed out after {:?}", self.timeout))??;
        Ok(WorkerStatus::probe(is_ready, started.elapsed()))
    }
}

/// Creates a channel to a fresh worker.
///
/// The production factory launches a process per channel; tests substitute
/// in-memory channels.
#[async_trait]
pub trait WorkerChannelFactory: Send + Sync {
    async fn create(&self, worker_id: &str) -> anyhow::Result<Arc<dyn WorkerChannel>>;
}

/// Launches a worker process per channel and probes it over HTTP.
pub struct ProcessChannelFactory {
    launcher: WorkerLauncher,
    next_port: AtomicU16,
    /// Launched processes, kept alive for the host's lifetime.
    processes: Mutex<Vec<WorkerProcess>>,
}

impl ProcessChannelFactory {
    pub fn new(launcher: WorkerLauncher, port_base: u16) -> Self {
        Self {
            launcher,
            next_port: AtomicU16::new(port_base),
            processes: Mutex::new(Vec::new()),
        }
    }

    /// Kill every launched worker process.
    pub async fn shutdown(&self) {
        let mut processes = self.processes.lock().await;
        for process in processes.iter_mut() {
            process.kill().await;
        }
        processes.clear();
    }
}

#[async_trait]
impl WorkerChannelFactory for ProcessChannelFactory {
    async fn create(&self, worker_id: &str) -> anyhow::Result<Arc<dyn WorkerChannel>> {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        let process = self.launcher.launch(worker_id, port)?;
        self.processes.lock().await.push(process);

        Ok(Arc::new(HttpStatusChannel::new(
            worker_id,
            format!("127.0.0.1:{port}"),
            PROBE_TIMEOUT,
        )))
    }
}
