pub mod download;
pub mod storage;

pub use download::trigger_bytes_download;
pub use storage::{BrowserStorage, KeyValueStorage, MemoryStorage, StorageError};
