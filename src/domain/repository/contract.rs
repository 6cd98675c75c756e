use async_trait::async_trait;

use crate::domain::entity::{Entity, Row};
use crate::domain::query::{Conditions, FilterError, Filters, ListOptions, PaginationOptions, Paginated, Query};
use crate::domain::repository::engine::EngineError;
use crate::Error;

/// リポジトリ操作のエラー
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("Missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("{table} record {id} not found")]
    NotFound { table: String, id: i64 },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to decode {table} row: {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::MissingParameter(_)
            | RepositoryError::InvalidFilter(_)
            | RepositoryError::InvalidOption(_) => Error::Usage(err.to_string()),
            RepositoryError::NotFound { .. } => Error::NotFound(err.to_string()),
            RepositoryError::Engine(engine) => Error::from(engine),
            RepositoryError::Decode { .. } => Error::Internal(err.to_string()),
        }
    }
}

/// エンティティ型ごとのデータアクセス操作
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Entity;

    /// IDで1件取得する（なければ `NotFound`）
    async fn find(&self, id: i64, trash: bool) -> Result<Self::Entity, RepositoryError>;

    /// フィルターに一致する最初の1件
    async fn find_one(&self, filters: &Filters, trash: bool) -> Result<Option<Self::Entity>, RepositoryError>;

    /// 行ロックをかけて取得する
    async fn find_and_lock(&self, id: i64) -> Result<Option<Self::Entity>, RepositoryError>;

    async fn create(&self, data: Row) -> Result<Self::Entity, RepositoryError>;

    /// IDで更新する（なければ `NotFound`）
    async fn update(&self, data: Row, id: i64) -> Result<bool, RepositoryError>;

    async fn update_by(&self, conditions: &Filters, data: Row) -> Result<usize, RepositoryError>;

    async fn update_or_create(&self, conditions: Row, data: Row) -> Result<Self::Entity, RepositoryError>;

    /// IDで削除する（なければ `NotFound`）
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;

    async fn delete_by(&self, conditions: &Filters) -> Result<usize, RepositoryError>;

    async fn delete_all(&self) -> Result<usize, RepositoryError>;

    /// フィールドの組み合わせごとの件数
    async fn grouping(&self, fields: &[&str], options: &ListOptions) -> Result<Vec<Row>, RepositoryError>;

    async fn list(&self, options: &ListOptions) -> Result<Vec<Self::Entity>, RepositoryError>;

    async fn list_paginated(
        &self,
        options: &ListOptions,
        pagination: &PaginationOptions,
        conditions: &Conditions,
    ) -> Result<Paginated<Self::Entity>, RepositoryError>;

    /// エクスポートされたクエリを実行する
    async fn get(&self, query: &Query) -> Result<Vec<Self::Entity>, RepositoryError>;

    async fn next_priority(&self) -> Result<i64, RepositoryError>;
}
