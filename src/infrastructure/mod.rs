pub mod engine;
pub mod storage;

pub use engine::MemoryEngine;
pub use storage::{MemoryStorage, StorageError};
