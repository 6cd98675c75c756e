use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};

use crate::domain::entity::{Row, Value};
use crate::domain::query::{Page, Query};
use crate::Error;

/// 永続化エンジンのエラー
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Column {0} not found in table {1}")]
    ColumnNotFound(String, String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TableNotFound(_)
            | EngineError::TableAlreadyExists(_)
            | EngineError::ColumnNotFound(_, _) => Error::Schema(err.to_string()),
            EngineError::ConstraintViolation(msg) | EngineError::DataError(msg) => Error::Execution(msg),
            EngineError::StorageError(msg) => Error::Storage(msg),
        }
    }
}

/// 永続化エンジン - クエリハンドルを実行し、スキーマ情報を提供する抽象インターフェース
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceEngine: Send + Sync {
    /// テーブルのカラム名を定義順で取得する
    async fn list_columns(&self, table: &str) -> Result<Vec<String>, EngineError>;

    /// キーワード検索の対象カラムを取得する
    async fn searchable_columns(&self, table: &str) -> Result<Vec<String>, EngineError> {
        self.list_columns(table).await
    }

    /// クエリに一致する行をすべて取得する
    async fn get(&self, query: &Query) -> Result<Vec<Row>, EngineError>;

    /// 最初の1行を取得する
    async fn first(&self, query: &Query) -> Result<Option<Row>, EngineError> {
        let rows = self.get(&query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// クエリに一致する行数を数える
    async fn count(&self, query: &Query) -> Result<usize, EngineError>;

    /// ページ単位で取得する（件数つき）
    async fn paginate(&self, query: &Query, per_page: usize, page: usize) -> Result<Page<Row>, EngineError> {
        let page = page.max(1);
        let total = self.count(&query.without_window()).await?;
        let items = self.get(&query.clone().for_page(page, per_page)).await?;
        Ok(Page::new(items, total, per_page, page))
    }

    /// カラムの最大値（行がなければNone）
    async fn max(&self, query: &Query, column: &str) -> Result<Option<Value>, EngineError>;

    /// 行を挿入し、採番後の行を返す
    async fn insert(&self, table: &str, row: Row) -> Result<Row, EngineError>;

    /// クエリに一致する行を更新し、件数を返す
    async fn update(&self, query: &Query, updates: &[(String, Value)]) -> Result<usize, EngineError>;

    /// クエリに一致する行を物理削除し、件数を返す
    async fn delete(&self, query: &Query) -> Result<usize, EngineError>;

    /// 全行を削除し、採番をリセットする
    async fn truncate(&self, table: &str) -> Result<usize, EngineError>;

    /// 日付の境界を解釈するタイムゾーン
    fn timezone(&self) -> FixedOffset {
        Utc.fix()
    }
}
