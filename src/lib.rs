pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{BaseRepository, RepositoryConfig};
pub use domain::entity::{Entity, Row, Value};
pub use domain::query::{
    Conditions, FilterOperator, FilterSpec, Filters, ListOptions, Page, Paginated, PaginationOptions,
    Query, SortDirection,
};
pub use domain::repository::{PersistenceEngine, Repository, RepositoryError};

// filterbase version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Crate-level result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
