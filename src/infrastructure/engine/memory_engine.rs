use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};
use tracing::debug;

use crate::domain::entity::{Row, Table, Value};
use crate::domain::query::Query;
use crate::domain::repository::{EngineError, PersistenceEngine};
use crate::infrastructure::storage::{MemoryStorage, StorageError};

/// インメモリストレージ上の永続化エンジン
pub struct MemoryEngine {
    storage: Arc<MemoryStorage>,
    timezone: FixedOffset,
    // テーブルごとのキーワード検索対象（未設定なら全カラム）
    searchable: HashMap<String, Vec<String>>,
}

impl MemoryEngine {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            timezone: Utc.fix(),
            searchable: HashMap::new(),
        }
    }

    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    /// キーワード検索の対象カラムを限定する
    pub fn with_searchable_columns<I, S>(mut self, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable
            .insert(table.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn storage(&self) -> &Arc<MemoryStorage> {
        &self.storage
    }

    pub fn create_table(&self, table: Table) -> Result<(), EngineError> {
        Ok(self.storage.create_table(table, false)?)
    }
}

#[async_trait]
impl PersistenceEngine for MemoryEngine {
    async fn list_columns(&self, table: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.storage.column_names(table)?)
    }

    async fn searchable_columns(&self, table: &str) -> Result<Vec<String>, EngineError> {
        match self.searchable.get(table) {
            Some(columns) => Ok(columns.clone()),
            None => self.list_columns(table).await,
        }
    }

    async fn get(&self, query: &Query) -> Result<Vec<Row>, EngineError> {
        // 行ロックは取らない（書き込みはストレージのRwLockで直列化される）
        debug!(sql = %query, locked = query.is_locked(), "memory engine get");
        Ok(self.storage.select_rows(query)?)
    }

    async fn count(&self, query: &Query) -> Result<usize, EngineError> {
        Ok(self.storage.count_rows(query)?)
    }

    async fn max(&self, query: &Query, column: &str) -> Result<Option<Value>, EngineError> {
        Ok(self.storage.max_value(query, column)?)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, EngineError> {
        Ok(self.storage.insert_row(table, row)?)
    }

    async fn update(&self, query: &Query, updates: &[(String, Value)]) -> Result<usize, EngineError> {
        debug!(sql = %query, columns = updates.len(), "memory engine update");
        Ok(self.storage.update_rows(query, updates)?)
    }

    async fn delete(&self, query: &Query) -> Result<usize, EngineError> {
        debug!(sql = %query, "memory engine delete");
        Ok(self.storage.delete_rows(query)?)
    }

    async fn truncate(&self, table: &str) -> Result<usize, EngineError> {
        Ok(self.storage.truncate(table)?)
    }

    fn timezone(&self) -> FixedOffset {
        self.timezone
    }
}

impl From<StorageError> for EngineError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::TableNotFound(name) => EngineError::TableNotFound(name),
            StorageError::TableAlreadyExists(name) => EngineError::TableAlreadyExists(name),
            StorageError::ColumnNotFound(col, table) => EngineError::ColumnNotFound(col, table),
            StorageError::TypeMismatch { .. } | StorageError::InvalidSchema(_) => {
                EngineError::DataError(error.to_string())
            }
            StorageError::NotNullViolation(_)
            | StorageError::UniqueViolation(_)
            | StorageError::PrimaryKeyViolation => EngineError::ConstraintViolation(error.to_string()),
            StorageError::Internal(msg) => EngineError::StorageError(msg),
        }
    }
}
