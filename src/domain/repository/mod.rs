pub mod engine;
pub mod contract;

pub use engine::{EngineError, PersistenceEngine};
pub use contract::{Repository, RepositoryError};

#[cfg(test)]
pub use engine::MockPersistenceEngine;
