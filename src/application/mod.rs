pub mod config;
pub mod filter_engine;
pub mod repository;

pub use config::RepositoryConfig;
pub use filter_engine::{apply_filters, apply_list_options};
pub use repository::BaseRepository;
