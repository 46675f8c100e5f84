//! Concurrent reconciliation, worker failures and shutdown races

mod common;

use async_trait::async_trait;
use common::{config, eventually, Node};
use qsync_core::application::{QueueSyncEngine, ReconcileOutcome};
use qsync_core::domain::QueueDefinition;
use qsync_core::port::{
    BufferError, BufferFactory, PersistentBuffer, TaskExecutor, WorkerFailure,
};
use qsync_infra_fs::DirectoryBufferFactory;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Directory buffers with open/close counters and a slow open
#[derive(Default)]
struct CountingFactory {
    inner: DirectoryBufferFactory,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    open_delay: Duration,
}

impl CountingFactory {
    fn with_delay(open_delay: Duration) -> Self {
        Self {
            open_delay,
            ..Self::default()
        }
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BufferFactory for CountingFactory {
    async fn open_or_create(&self, directory: &Path) -> Result<Arc<dyn PersistentBuffer>, BufferError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        let inner = self.inner.open_or_create(directory).await?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingBuffer {
            inner,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct CountingBuffer {
    inner: Arc<dyn PersistentBuffer>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PersistentBuffer for CountingBuffer {
    fn bind_executor(&self, executor: Arc<dyn TaskExecutor>) {
        self.inner.bind_executor(executor);
    }

    fn set_max_payload_size(&self, bytes: i64) -> Result<(), BufferError> {
        self.inner.set_max_payload_size(bytes)
    }

    fn set_max_size(&self, bytes: i64) -> Result<(), BufferError> {
        self.inner.set_max_size(bytes)
    }

    async fn close(&self) -> Result<(), BufferError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

async fn start_counting(node: &Node, factory: Arc<CountingFactory>) -> Arc<QueueSyncEngine> {
    let mut deps = node.deps("s1");
    deps.buffers = factory;
    QueueSyncEngine::start(deps, config()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_queues_open_once_each() {
    let node = Node::new();
    node.repository.set_up(true);
    let factory = Arc::new(CountingFactory::with_delay(Duration::from_millis(5)));
    let engine = start_counting(&node, factory.clone()).await;

    for i in 0..32 {
        node.repository
            .upsert(QueueDefinition::new(format!("q{}", i), "s1"))
            .unwrap();
    }
    // A sweep racing the per-queue events
    let report = engine.sync_all().await;
    assert!(report.is_clean());

    assert!(eventually(|| engine.open_queue_ids().len() == 32).await);
    assert_eq!(factory.opens(), 32);

    let shutdown = engine.shutdown().await;
    assert_eq!(shutdown.closed, 32);
    assert_eq!(factory.closes(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_flapping_master_settles_on_latest_version() {
    let node = Node::new();
    node.repository.set_up(true);
    let factory = Arc::new(CountingFactory::default());
    let engine = start_counting(&node, factory.clone()).await;

    for i in 0..=20u64 {
        let master = if i % 2 == 0 { "s1" } else { "s2" };
        node.repository
            .upsert(QueueDefinition::new("q1", master).with_limits(100 + i as i64, 1 << 20))
            .unwrap();
    }

    assert!(eventually(|| engine.lookup("q1").map(|h| h.version()) == Some(20)).await);
    assert_eq!(factory.opens() - factory.closes(), 1);

    // Older events still in flight are dropped as stale
    let old = QueueDefinition::new("q1", "s2").with_version(3);
    assert!(matches!(
        engine.reconcile(&old).await,
        ReconcileOutcome::Stale {
            latest: 20,
            received: 3
        }
    ));
    assert!(engine.lookup("q1").is_some());

    engine.shutdown().await;
    assert_eq!(factory.opens(), factory.closes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_task_reported_and_engine_keeps_working() {
    let node = Node::new();
    node.repository.set_up(true);
    let failures: Arc<Mutex<Vec<WorkerFailure>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let failures = failures.clone();
        Arc::new(move |failure: WorkerFailure| failures.lock().unwrap().push(failure))
    };
    let engine = QueueSyncEngine::start_with_failure_sink(node.deps("s1"), config(), sink)
        .await
        .unwrap();

    engine
        .executor()
        .execute(Box::new(|| panic!("segment index corrupted")))
        .unwrap();
    assert!(eventually(|| !failures.lock().unwrap().is_empty()).await);
    {
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("segment index corrupted"));
        assert!(failures[0].worker.starts_with("it-queue-sync-"));
    }

    // The pool still runs work and buffers still open
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    engine
        .executor()
        .execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    assert!(eventually(|| ran.load(Ordering::SeqCst) == 1).await);

    let outcome = engine.reconcile(&QueueDefinition::new("q1", "s1")).await;
    assert!(matches!(outcome, ReconcileOutcome::Opened { .. }));
    assert_eq!(engine.executor_stats().failed_tasks, 1);

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_waits_for_in_flight_reconcile() {
    let node = Node::new();
    node.repository.set_up(true);
    let factory = Arc::new(CountingFactory::with_delay(Duration::from_millis(200)));
    let engine = start_counting(&node, factory.clone()).await;

    let reconciling = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reconcile(&QueueDefinition::new("q1", "s1")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let report = engine.shutdown().await;
    let outcome = reconciling.await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Opened { .. }));
    assert_eq!(report.closed, 1);
    assert!(engine.open_queue_ids().is_empty());
    assert_eq!(factory.opens(), 1);
    assert_eq!(factory.closes(), 1);

    // Nothing opens once the engine is down
    let late = engine.reconcile(&QueueDefinition::new("q2", "s1")).await;
    assert!(matches!(late, ReconcileOutcome::Skipped));
    assert_eq!(factory.opens(), 1);
}
