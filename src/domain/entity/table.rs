use crate::domain::entity::column::Column;
use crate::domain::entity::value::{Value, ValueError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Column '{0}' already exists in table")]
    ColumnAlreadyExists(String),

    #[error("Table must have at least one column")]
    NoColumns,

    #[error("Multiple primary keys not allowed")]
    MultiplePrimaryKeys,
}

impl From<TableError> for crate::Error {
    fn from(err: TableError) -> Self {
        crate::Error::Schema(err.to_string())
    }
}

/// テーブルのスキーマ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(&mut self, column: Column) -> Result<(), TableError> {
        if self.get_column(&column.name).is_some() {
            return Err(TableError::ColumnAlreadyExists(column.name));
        }
        if column.is_primary_key() && self.get_primary_key().is_some() {
            return Err(TableError::MultiplePrimaryKeys);
        }

        self.columns.push(column);
        Ok(())
    }

    /// ビルダー形式でカラムを追加する
    pub fn with_column(mut self, column: Column) -> Result<Self, TableError> {
        self.add_column(column)?;
        Ok(self)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn get_primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.columns.is_empty() {
            return Err(TableError::NoColumns);
        }
        Ok(())
    }

    /// 定義順のカラム名
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// 1行分のデータ（カラム名 -> 値）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// ビルダー形式で値を設定する
    pub fn with(mut self, column_name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column_name, value.into());
        self
    }

    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.values.get(column_name)
    }

    pub fn set(&mut self, column_name: impl Into<String>, value: Value) {
        self.values.insert(column_name.into(), value);
    }

    pub fn contains(&self, column_name: &str) -> bool {
        self.values.contains_key(column_name)
    }

    /// `other` の値で上書きする
    pub fn merge(&mut self, other: &Row) {
        for (column, value) in &other.values {
            self.values.insert(column.clone(), value.clone());
        }
    }

    /// 更新用の (カラム名, 値) の組に変換する
    pub fn assignments(&self) -> Vec<(String, Value)> {
        self.values
            .iter()
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    /// JSONオブジェクトから行を作成する
    pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self, ValueError> {
        let mut row = Row::new();
        for (column, json) in map {
            row.set(column.clone(), Value::from_json(json)?);
        }
        Ok(row)
    }

    /// JSONオブジェクトに変換する
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
