// Qsync Infrastructure - Filesystem Adapters
// Implements: StorageLocator, BufferFactory / PersistentBuffer

mod directory_buffer;
mod storage_locator;

pub use directory_buffer::{BufferSettings, DirectoryBuffer, DirectoryBufferFactory};
pub use storage_locator::DataDirStorageLocator;
