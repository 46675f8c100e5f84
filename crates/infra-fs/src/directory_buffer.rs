// Directory-backed buffer
//
// Reference PersistentBuffer: owns a directory holding `buffer.json`
// (settings) and the message segment files (`*.seg`). Segment I/O belongs to
// the message store proper; this adapter only accounts for their size.

use async_trait::async_trait;
use qsync_core::port::{BufferError, BufferFactory, PersistentBuffer, TaskExecutor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const SETTINGS_FILE: &str = "buffer.json";
const SEGMENT_EXTENSION: &str = "seg";

/// Persisted buffer limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSettings {
    pub max_payload_size: i64,
    pub max_size: i64,
}

/// Opens DirectoryBuffers
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryBufferFactory;

impl DirectoryBufferFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BufferFactory for DirectoryBufferFactory {
    async fn open_or_create(&self, directory: &Path) -> Result<Arc<dyn PersistentBuffer>, BufferError> {
        let buffer = DirectoryBuffer::open(directory).await?;
        Ok(Arc::new(buffer))
    }
}

/// Settings plus the file they live in
///
/// Flushes write the current value under the lock, so writes finishing out
/// of order still leave the latest settings on disk.
struct SettingsFile {
    path: PathBuf,
    settings: Mutex<BufferSettings>,
}

impl SettingsFile {
    fn get(&self) -> BufferSettings {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut BufferSettings)) {
        apply(&mut self.settings.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn flush(&self) -> std::io::Result<()> {
        let settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        let json = serde_json::to_vec_pretty(&*settings).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, json)
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to write buffer settings");
        }
    }
}

/// Buffer stored in one directory
pub struct DirectoryBuffer {
    directory: PathBuf,
    file: Arc<SettingsFile>,
    used_bytes: i64,
    executor: Mutex<Option<Arc<dyn TaskExecutor>>>,
    closed: AtomicBool,
}

impl DirectoryBuffer {
    /// Open the buffer in `directory`, creating the directory if needed
    ///
    /// # Errors
    /// - BufferError::Resource on I/O failure or an unreadable settings file
    pub async fn open(directory: &Path) -> Result<Self, BufferError> {
        tokio::fs::create_dir_all(directory).await?;

        let settings_path = directory.join(SETTINGS_FILE);
        let settings = match tokio::fs::read(&settings_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                BufferError::Resource(format!("corrupt {}: {}", settings_path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BufferSettings::default(),
            Err(e) => return Err(e.into()),
        };
        let used_bytes = segment_bytes(directory).await?;

        info!(
            directory = %directory.display(),
            used_bytes,
            "Opened directory buffer"
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            file: Arc::new(SettingsFile {
                path: settings_path,
                settings: Mutex::new(settings),
            }),
            used_bytes,
            executor: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn settings(&self) -> BufferSettings {
        self.file.get()
    }

    /// Bytes held in segment files when the buffer was opened
    pub fn used_bytes(&self) -> i64 {
        self.used_bytes
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), BufferError> {
        if self.is_closed() {
            return Err(BufferError::State(format!(
                "buffer {} is closed",
                self.directory.display()
            )));
        }
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut BufferSettings)) {
        self.file.update(apply);
        self.flush_in_background();
    }

    /// Flush on the bound executor, or inline if there is none
    fn flush_in_background(&self) {
        let executor = self
            .executor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(executor) = executor else {
            self.file.flush_logged();
            return;
        };
        let file = Arc::clone(&self.file);
        if let Err(e) = executor.execute(Box::new(move || file.flush_logged())) {
            warn!(
                directory = %self.directory.display(),
                executor = %executor.name(),
                error = %e,
                "Executor rejected settings write, writing inline"
            );
            self.file.flush_logged();
        }
    }
}

#[async_trait]
impl PersistentBuffer for DirectoryBuffer {
    fn bind_executor(&self, executor: Arc<dyn TaskExecutor>) {
        *self.executor.lock().unwrap_or_else(PoisonError::into_inner) = Some(executor);
    }

    fn set_max_payload_size(&self, bytes: i64) -> Result<(), BufferError> {
        self.ensure_open()?;
        if bytes <= 0 {
            return Err(BufferError::Configuration(format!(
                "max_payload_size must be positive, got {}",
                bytes
            )));
        }
        if self.settings().max_payload_size == bytes {
            return Ok(());
        }
        self.update(|s| s.max_payload_size = bytes);
        Ok(())
    }

    fn set_max_size(&self, bytes: i64) -> Result<(), BufferError> {
        self.ensure_open()?;
        if bytes < 0 {
            return Err(BufferError::Configuration(format!(
                "max_size must not be negative, got {}",
                bytes
            )));
        }
        if bytes < self.used_bytes {
            return Err(BufferError::State(format!(
                "max_size {} is below the {} bytes already stored",
                bytes, self.used_bytes
            )));
        }
        if self.settings().max_size == bytes {
            return Ok(());
        }
        self.update(|s| s.max_size = bytes);
        Ok(())
    }

    async fn close(&self) -> Result<(), BufferError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.flush())
            .await
            .map_err(|e| BufferError::Resource(e.to_string()))??;
        self.executor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!(directory = %self.directory.display(), "Closed directory buffer");
        Ok(())
    }
}

async fn segment_bytes(directory: &Path) -> Result<i64, BufferError> {
    let mut total = 0i64;
    let mut entries = tokio::fs::read_dir(directory).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(SEGMENT_EXTENSION) {
            total += entry.metadata().await?.len() as i64;
        }
    }
    Ok(total)
}
