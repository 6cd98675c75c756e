pub mod memory_engine;

pub use memory_engine::MemoryEngine;
