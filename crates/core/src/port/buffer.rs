// Persistent Buffer Port
// Durable per-queue message store; storage format is owned by the adapter

use super::task_executor::TaskExecutor;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Buffer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Invalid property value (e.g. a negative size)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Value not acceptable for the buffer's current state
    #[error("Invalid state: {0}")]
    State(String),

    /// I/O failure opening or closing the buffer
    #[error("Resource error: {0}")]
    Resource(String),
}

impl From<std::io::Error> for BufferError {
    fn from(err: std::io::Error) -> Self {
        BufferError::Resource(err.to_string())
    }
}

/// An open durable message store for one queue
#[async_trait]
pub trait PersistentBuffer: Send + Sync {
    /// Executor used for the buffer's background work
    fn bind_executor(&self, executor: Arc<dyn TaskExecutor>);

    /// # Errors
    /// - BufferError::Configuration if `bytes` is invalid
    fn set_max_payload_size(&self, bytes: i64) -> Result<(), BufferError>;

    /// # Errors
    /// - BufferError::Configuration if `bytes` is invalid
    /// - BufferError::State if `bytes` is too small for the current contents
    fn set_max_size(&self, bytes: i64) -> Result<(), BufferError>;

    /// Release the buffer. Best effort: callers drop the buffer regardless.
    async fn close(&self) -> Result<(), BufferError>;
}

/// Opens buffers
#[async_trait]
pub trait BufferFactory: Send + Sync {
    /// Open the buffer stored in `directory`, creating it if missing
    ///
    /// # Errors
    /// - BufferError::Resource on I/O failure
    async fn open_or_create(&self, directory: &Path) -> Result<Arc<dyn PersistentBuffer>, BufferError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory buffer recording every call made on it
    pub struct MockBuffer {
        directory: PathBuf,
        max_payload_size: AtomicI64,
        max_size: AtomicI64,
        used_bytes: AtomicI64,
        executor: Mutex<Option<Arc<dyn TaskExecutor>>>,
        bind_calls: AtomicUsize,
        close_calls: AtomicUsize,
        fail_close: AtomicBool,
    }

    impl MockBuffer {
        pub fn new(directory: impl Into<PathBuf>) -> Self {
            Self {
                directory: directory.into(),
                max_payload_size: AtomicI64::new(0),
                max_size: AtomicI64::new(0),
                used_bytes: AtomicI64::new(0),
                executor: Mutex::new(None),
                bind_calls: AtomicUsize::new(0),
                close_calls: AtomicUsize::new(0),
                fail_close: AtomicBool::new(false),
            }
        }

        pub fn directory(&self) -> &Path {
            &self.directory
        }

        pub fn max_payload_size(&self) -> i64 {
            self.max_payload_size.load(Ordering::SeqCst)
        }

        pub fn max_size(&self) -> i64 {
            self.max_size.load(Ordering::SeqCst)
        }

        /// Pretend the buffer already holds `bytes` of messages
        pub fn set_used_bytes(&self, bytes: i64) {
            self.used_bytes.store(bytes, Ordering::SeqCst);
        }

        pub fn executor(&self) -> Option<Arc<dyn TaskExecutor>> {
            self.executor.lock().unwrap().clone()
        }

        pub fn bind_calls(&self) -> usize {
            self.bind_calls.load(Ordering::SeqCst)
        }

        pub fn close_calls(&self) -> usize {
            self.close_calls.load(Ordering::SeqCst)
        }

        pub fn is_closed(&self) -> bool {
            self.close_calls() > 0
        }

        pub fn set_fail_close(&self, fail: bool) {
            self.fail_close.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PersistentBuffer for MockBuffer {
        fn bind_executor(&self, executor: Arc<dyn TaskExecutor>) {
            *self.executor.lock().unwrap() = Some(executor);
            self.bind_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn set_max_payload_size(&self, bytes: i64) -> Result<(), BufferError> {
            if bytes <= 0 {
                return Err(BufferError::Configuration(format!(
                    "max payload size must be positive, got {}",
                    bytes
                )));
            }
            self.max_payload_size.store(bytes, Ordering::SeqCst);
            Ok(())
        }

        fn set_max_size(&self, bytes: i64) -> Result<(), BufferError> {
            if bytes < 0 {
                return Err(BufferError::Configuration(format!(
                    "max size must not be negative, got {}",
                    bytes
                )));
            }
            let used = self.used_bytes.load(Ordering::SeqCst);
            if bytes < used {
                return Err(BufferError::State(format!(
                    "max size {} is below current size {}",
                    bytes, used
                )));
            }
            self.max_size.store(bytes, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<(), BufferError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_close.load(Ordering::SeqCst) {
                return Err(BufferError::Resource("mock close failure".to_string()));
            }
            Ok(())
        }
    }

    /// Factory that hands out MockBuffers and can be told to fail
    ///
    /// Queue ids are taken from the last component of the directory.
    #[derive(Default)]
    pub struct MockBufferFactory {
        opened: Mutex<Vec<(String, Arc<MockBuffer>)>>,
        failing_open: Mutex<HashSet<String>>,
        failing_close: Mutex<HashSet<String>>,
        open_delay: Mutex<Option<Duration>>,
    }

    impl MockBufferFactory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_open_for(&self, queue_id: impl Into<String>) {
            self.failing_open.lock().unwrap().insert(queue_id.into());
        }

        pub fn clear_failures(&self) {
            self.failing_open.lock().unwrap().clear();
            self.failing_close.lock().unwrap().clear();
        }

        /// Buffers opened for `queue_id` from now on fail to close
        pub fn fail_close_for(&self, queue_id: impl Into<String>) {
            self.failing_close.lock().unwrap().insert(queue_id.into());
        }

        /// Slow down every open (widens race windows in tests)
        pub fn set_open_delay(&self, delay: Duration) {
            *self.open_delay.lock().unwrap() = Some(delay);
        }

        /// Number of successful opens for `queue_id`
        pub fn open_count(&self, queue_id: &str) -> usize {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| id == queue_id)
                .count()
        }

        pub fn total_opens(&self) -> usize {
            self.opened.lock().unwrap().len()
        }

        /// Most recently opened buffer for `queue_id`
        pub fn last_buffer(&self, queue_id: &str) -> Option<Arc<MockBuffer>> {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(id, _)| id == queue_id)
                .map(|(_, b)| Arc::clone(b))
        }

        pub fn all_buffers(&self) -> Vec<Arc<MockBuffer>> {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .map(|(_, b)| Arc::clone(b))
                .collect()
        }
    }

    #[async_trait]
    impl BufferFactory for MockBufferFactory {
        async fn open_or_create(
            &self,
            directory: &Path,
        ) -> Result<Arc<dyn PersistentBuffer>, BufferError> {
            let delay = *self.open_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let queue_id = directory
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if self.failing_open.lock().unwrap().contains(&queue_id) {
                return Err(BufferError::Resource(format!(
                    "cannot open {}",
                    directory.display()
                )));
            }

            let buffer = Arc::new(MockBuffer::new(directory));
            if self.failing_close.lock().unwrap().contains(&queue_id) {
                buffer.set_fail_close(true);
            }
            self.opened
                .lock()
                .unwrap()
                .push((queue_id, Arc::clone(&buffer)));
            Ok(buffer)
        }
    }
}
