//! End-to-end scale-up: a dispatcher with one chronically slow worker grows
//! to the configured cap under the concurrency manager, and no further.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use polyhost_concurrency::{ConcurrencyManager, ConcurrencyOptions};
use polyhost_core::{FunctionDispatcher, RuntimeKind, WorkerChannel, WorkerStatus};
use polyhost_dispatch::{RpcFunctionDispatcher, WorkerChannelFactory};

/// Every channel this factory creates reports a held, slow latency.
struct SlowChannelFactory {
    latency: Duration,
}

struct SlowChannel {
    worker_id: String,
    latency: Duration,
}

#[async_trait]
impl WorkerChannel for SlowChannel {
    fn worker_id(&self) -> &str {
        &self.worker_id
    }

    async fn get_status(&self) -> anyhow::Result<WorkerStatus> {
        Ok(WorkerStatus::probe(true, self.latency))
    }
}

#[async_trait]
impl WorkerChannelFactory for SlowChannelFactory {
    async fn create(&self, worker_id: &str) -> anyhow::Result<Arc<dyn WorkerChannel>> {
        Ok(Arc::new(SlowChannel {
            worker_id: worker_id.to_string(),
            latency: self.latency,
        }))
    }
}

#[tokio::test]
async fn overloaded_pool_grows_to_the_cap_and_stops() {
    let options = Arc::new(ConcurrencyOptions {
        enabled: true,
        check_interval: Duration::from_millis(10),
        adjustment_period: Duration::ZERO,
        history_size: 5,
        history_threshold: 1.0,
        latency_threshold: Duration::from_millis(50),
        max_worker_count: 2,
    });

    let dispatcher = Arc::new(RpcFunctionDispatcher::new(
        RuntimeKind::Node,
        options.clone(),
        Arc::new(SlowChannelFactory {
            latency: Duration::from_millis(200),
        }),
    ));
    dispatcher.start_worker_channel().await.unwrap();
    assert_eq!(dispatcher.worker_count().await, 1);

    let manager = ConcurrencyManager::new(
        options,
        dispatcher.clone() as Arc<dyn FunctionDispatcher>,
    );
    manager.start().await;

    // The first worker's window fills, the manager notices the overload and
    // adds the second worker.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while dispatcher.worker_count().await < 2 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "pool never grew to the cap"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Both workers stay slow, but the cap holds.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(dispatcher.worker_count().await, 2);

    manager.stop().await;
    manager.dispose().await;
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn healthy_pool_never_grows() {
    let options = Arc::new(ConcurrencyOptions {
        enabled: true,
        check_interval: Duration::from_millis(10),
        adjustment_period: Duration::ZERO,
        history_size: 5,
        history_threshold: 1.0,
        latency_threshold: Duration::from_millis(50),
        max_worker_count: 4,
    });

    let dispatcher = Arc::new(RpcFunctionDispatcher::new(
        RuntimeKind::Node,
        options.clone(),
        Arc::new(SlowChannelFactory {
            latency: Duration::from_millis(2),
        }),
    ));
    dispatcher.start_worker_channel().await.unwrap();

    let manager = ConcurrencyManager::new(
        options,
        dispatcher.clone() as Arc<dyn FunctionDispatcher>,
    );
    manager.start().await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(dispatcher.worker_count().await, 1);

    manager.dispose().await;
    dispatcher.shutdown().await;
}
