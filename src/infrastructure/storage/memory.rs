use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use thiserror::Error;

use crate::domain::entity::{DataType, Row, Table, Value};
use crate::domain::query::{FilterCondition, FilterOperator, Query, SelectItem, SortDirection};

/// 挿入・更新時に自動で埋めるカラム
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// ストレージエラー
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Column {0} not found in table {1}")]
    ColumnNotFound(String, String),

    #[error("Data type mismatch for column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Not null constraint violation for column {0}")]
    NotNullViolation(String),

    #[error("Unique constraint violation for column {0}")]
    UniqueViolation(String),

    #[error("Primary key constraint violation")]
    PrimaryKeyViolation,

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Internal storage error: {0}")]
    Internal(String),
}

/// テーブルのデータを保持する構造体
#[derive(Debug, Clone)]
struct TableData {
    schema: Table,
    rows: Vec<Row>,
    // 次に採番するID
    next_id: i64,
}

impl TableData {
    fn new(schema: Table) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn ensure_column(&self, column: &str) -> Result<(), StorageError> {
        if self.schema.has_column(column) {
            Ok(())
        } else {
            Err(StorageError::ColumnNotFound(column.to_string(), self.schema.name.clone()))
        }
    }

    /// クエリが参照するカラムがすべて存在するか確認する
    fn check_query(&self, query: &Query) -> Result<(), StorageError> {
        if let Some(predicate) = query.predicate() {
            self.check_condition(&predicate)?;
        }
        for group in query.groups() {
            self.ensure_column(group)?;
        }
        for item in query.select_items() {
            if let SelectItem::Column(column) = item {
                self.ensure_column(column)?;
            }
        }
        // 集計結果の別名での並び替えは許可する
        for order in query.orders() {
            let is_alias = query.select_items().iter().any(|item| {
                matches!(item, SelectItem::CountAll { alias } if *alias == order.column)
            });
            if !is_alias {
                self.ensure_column(&order.column)?;
            }
        }
        Ok(())
    }

    fn check_condition(&self, condition: &FilterCondition) -> Result<(), StorageError> {
        match condition {
            FilterCondition::Simple { column, .. }
            | FilterCondition::IsNull(column)
            | FilterCondition::NotNull(column) => self.ensure_column(column),
            FilterCondition::And(conditions) | FilterCondition::Or(conditions) => {
                conditions.iter().try_for_each(|c| self.check_condition(c))
            }
        }
    }

    fn validate_value(&self, column_name: &str, value: &Value) -> Result<(), StorageError> {
        let column = self
            .schema
            .get_column(column_name)
            .ok_or_else(|| StorageError::ColumnNotFound(column_name.to_string(), self.schema.name.clone()))?;

        if value.is_null() {
            if column.is_not_null() {
                return Err(StorageError::NotNullViolation(column.name.clone()));
            }
            return Ok(());
        }

        if !column.data_type.accepts(value.data_type()) {
            return Err(StorageError::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type,
                actual: value.data_type(),
            });
        }
        Ok(())
    }

    fn insert_row(&mut self, row: Row) -> Result<Row, StorageError> {
        let mut row = row;

        // 主キーの自動採番
        if let Some(pk) = self.schema.get_primary_key() {
            let pk_name = pk.name.clone();
            let missing = row.get(&pk_name).map_or(true, Value::is_null);
            if missing && pk.data_type == DataType::Integer {
                row.set(pk_name, Value::Integer(self.next_id));
            }
        }

        // タイムスタンプ
        let now = Value::Timestamp(Utc::now());
        for stamp in [CREATED_AT, UPDATED_AT] {
            if self.schema.has_column(stamp) && row.get(stamp).map_or(true, Value::is_null) {
                row.set(stamp, now.clone());
            }
        }

        for (column, value) in &row.values {
            self.validate_value(column, value)?;
        }

        // 指定されなかったカラムはNULLで埋める
        for column in &self.schema.columns {
            if !row.contains(&column.name) {
                if column.is_not_null() {
                    return Err(StorageError::NotNullViolation(column.name.clone()));
                }
                row.set(column.name.clone(), Value::Null);
            }
        }

        self.check_constraints(&row)?;

        if let Some(id) = self.schema.get_primary_key().and_then(|pk| row.get(&pk.name)).and_then(Value::as_i64) {
            self.next_id = self.next_id.max(id + 1);
        }

        self.rows.push(row.clone());
        Ok(row)
    }

    fn check_constraints(&self, row: &Row) -> Result<(), StorageError> {
        for column in &self.schema.columns {
            if !(column.is_primary_key() || column.is_unique()) {
                continue;
            }
            let value = match row.get(&column.name) {
                Some(v) if !v.is_null() => v,
                // NULLは一意制約に違反しない
                _ => continue,
            };
            let duplicated = self
                .rows
                .iter()
                .any(|existing| existing.get(&column.name).map_or(false, |v| v.sql_eq(value)));
            if duplicated {
                return Err(if column.is_primary_key() {
                    StorageError::PrimaryKeyViolation
                } else {
                    StorageError::UniqueViolation(column.name.clone())
                });
            }
        }
        Ok(())
    }

    fn matches(&self, row: &Row, predicate: Option<&FilterCondition>) -> bool {
        predicate.map_or(true, |p| eval_filter(row, p))
    }

    fn select(&self, query: &Query) -> Vec<Row> {
        let predicate = query.predicate();
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| self.matches(row, predicate.as_ref()))
            .cloned()
            .collect();

        let mut rows = if query.groups().is_empty() && has_count(query) {
            vec![aggregate_row(query, &rows)]
        } else if query.groups().is_empty() {
            rows
        } else {
            group_rows(query, rows)
        };

        sort_rows(&mut rows, query);

        let offset = query.offset_value().unwrap_or(0);
        let limit = query.limit_value().unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset).take(limit);

        if query.groups().is_empty() && !has_count(query) && !query.select_items().is_empty() {
            rows.map(|row| project(query, &row)).collect()
        } else {
            rows.collect()
        }
    }

    fn update_rows(&mut self, query: &Query, updates: &[(String, Value)]) -> Result<usize, StorageError> {
        for (column, value) in updates {
            self.validate_value(column, value)?;
        }

        let touch = self.schema.has_column(UPDATED_AT) && !updates.iter().any(|(c, _)| c == UPDATED_AT);
        let now = Value::Timestamp(Utc::now());
        let predicate = query.predicate();

        // 事前にフィルタを通過する行のインデックスを収集
        let indices: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row, predicate.as_ref()))
            .map(|(i, _)| i)
            .collect();

        for &idx in &indices {
            let row = &mut self.rows[idx];
            for (column, value) in updates {
                row.set(column.clone(), value.clone());
            }
            if touch {
                row.set(UPDATED_AT, now.clone());
            }
        }

        Ok(indices.len())
    }

    fn delete_rows(&mut self, query: &Query) -> usize {
        let predicate = query.predicate();
        let before = self.rows.len();
        self.rows.retain(|row| !predicate.as_ref().map_or(true, |p| eval_filter(row, p)));
        before - self.rows.len()
    }

    fn truncate(&mut self) -> usize {
        let removed = self.rows.len();
        self.rows.clear();
        self.next_id = 1;
        removed
    }
}

fn has_count(query: &Query) -> bool {
    query
        .select_items()
        .iter()
        .any(|item| matches!(item, SelectItem::CountAll { .. }))
}

// グループ化せずに count(*) だけを求める
fn aggregate_row(query: &Query, rows: &[Row]) -> Row {
    let mut result = Row::new();
    for item in query.select_items() {
        match item {
            SelectItem::CountAll { alias } => result.set(alias.clone(), Value::Integer(rows.len() as i64)),
            SelectItem::Column(column) => {
                let value = rows.first().and_then(|r| r.get(column)).cloned().unwrap_or(Value::Null);
                result.set(column.clone(), value);
            }
        }
    }
    result
}

// 初めて現れた順にグループを並べる
fn group_rows(query: &Query, rows: Vec<Row>) -> Vec<Row> {
    let mut buckets: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = query
            .groups()
            .iter()
            .map(|g| row.get(g).cloned().unwrap_or(Value::Null))
            .collect();
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => buckets.push((key, vec![row])),
        }
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let mut result = aggregate_row(query, &members);
            for (group, value) in query.groups().iter().zip(key) {
                result.set(group.clone(), value);
            }
            result
        })
        .collect()
}

fn project(query: &Query, row: &Row) -> Row {
    query
        .select_items()
        .iter()
        .filter_map(|item| match item {
            SelectItem::Column(column) => Some((column.clone(), row.get(column).cloned().unwrap_or(Value::Null))),
            SelectItem::CountAll { .. } => None,
        })
        .collect()
}

// 安定ソート。NULLは昇順で先頭に来る
fn sort_rows(rows: &mut [Row], query: &Query) {
    if query.orders().is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in query.orders() {
            let left = a.get(&order.column).unwrap_or(&Value::Null);
            let right = b.get(&order.column).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
            };
            let ordering = match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// 1行に対して条件を評価する
pub fn eval_filter(row: &Row, filter: &FilterCondition) -> bool {
    match filter {
        FilterCondition::Simple { column, operator, value } => {
            let row_value = row.get(column).unwrap_or(&Value::Null);
            let ordering = row_value.compare(value);

            match operator {
                FilterOperator::Equal => ordering == Some(Ordering::Equal),
                FilterOperator::NotEqual => matches!(ordering, Some(o) if o != Ordering::Equal),
                FilterOperator::Greater => ordering == Some(Ordering::Greater),
                FilterOperator::GreaterOrEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                FilterOperator::Less => ordering == Some(Ordering::Less),
                FilterOperator::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                FilterOperator::Like => !value.is_null() && row_value.matches_like(&value.to_string()),
                FilterOperator::NotLike => {
                    !value.is_null() && !row_value.is_null() && !row_value.matches_like(&value.to_string())
                }
            }
        }
        FilterCondition::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        FilterCondition::NotNull(column) => row.get(column).map_or(false, |v| !v.is_null()),
        FilterCondition::And(conditions) => conditions.iter().all(|c| eval_filter(row, c)),
        FilterCondition::Or(conditions) => conditions.iter().any(|c| eval_filter(row, c)),
    }
}

/// インメモリストレージの実装
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, TableData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, TableData>>, StorageError> {
        self.tables
            .read()
            .map_err(|_| StorageError::Internal("table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, TableData>>, StorageError> {
        self.tables
            .write()
            .map_err(|_| StorageError::Internal("table lock poisoned".to_string()))
    }

    fn with_table<T>(&self, name: &str, f: impl FnOnce(&TableData) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let tables = self.read()?;
        let data = tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))?;
        f(data)
    }

    fn with_table_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut TableData) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut tables = self.write()?;
        let data = tables
            .get_mut(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))?;
        f(data)
    }

    /// テーブルを作成する
    pub fn create_table(&self, table: Table, if_not_exists: bool) -> Result<(), StorageError> {
        table
            .validate()
            .map_err(|e| StorageError::InvalidSchema(e.to_string()))?;

        let mut tables = self.write()?;
        if tables.contains_key(&table.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(StorageError::TableAlreadyExists(table.name));
        }

        tables.insert(table.name.clone(), TableData::new(table));
        Ok(())
    }

    pub fn drop_table(&self, table_name: &str, if_exists: bool) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        if tables.remove(table_name).is_none() && !if_exists {
            return Err(StorageError::TableNotFound(table_name.to_string()));
        }
        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(table_name))
    }

    pub fn get_table(&self, table_name: &str) -> Result<Table, StorageError> {
        self.with_table(table_name, |data| Ok(data.schema.clone()))
    }

    pub fn column_names(&self, table_name: &str) -> Result<Vec<String>, StorageError> {
        self.with_table(table_name, |data| Ok(data.schema.column_names()))
    }

    pub fn insert_row(&self, table_name: &str, row: Row) -> Result<Row, StorageError> {
        self.with_table_mut(table_name, |data| data.insert_row(row))
    }

    pub fn select_rows(&self, query: &Query) -> Result<Vec<Row>, StorageError> {
        self.with_table(query.table_name(), |data| {
            data.check_query(query)?;
            Ok(data.select(query))
        })
    }

    pub fn count_rows(&self, query: &Query) -> Result<usize, StorageError> {
        self.with_table(query.table_name(), |data| {
            data.check_query(query)?;
            let predicate = query.predicate();
            Ok(data.rows.iter().filter(|row| data.matches(row, predicate.as_ref())).count())
        })
    }

    /// 条件に一致する行のうち、カラムの最大値（NULLは無視）
    pub fn max_value(&self, query: &Query, column: &str) -> Result<Option<Value>, StorageError> {
        self.with_table(query.table_name(), |data| {
            data.check_query(query)?;
            data.ensure_column(column)?;
            let predicate = query.predicate();
            let max = data
                .rows
                .iter()
                .filter(|row| data.matches(row, predicate.as_ref()))
                .filter_map(|row| row.get(column).filter(|v| !v.is_null()))
                .max_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal))
                .cloned();
            Ok(max)
        })
    }

    pub fn update_rows(&self, query: &Query, updates: &[(String, Value)]) -> Result<usize, StorageError> {
        self.with_table_mut(query.table_name(), |data| {
            data.check_query(query)?;
            data.update_rows(query, updates)
        })
    }

    pub fn delete_rows(&self, query: &Query) -> Result<usize, StorageError> {
        self.with_table_mut(query.table_name(), |data| {
            data.check_query(query)?;
            Ok(data.delete_rows(query))
        })
    }

    pub fn truncate(&self, table_name: &str) -> Result<usize, StorageError> {
        self.with_table_mut(table_name, |data| Ok(data.truncate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Column;

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let table = Table::new("items")
            .with_column(Column::new("id", DataType::Integer).primary_key())
            .and_then(|t| t.with_column(Column::new("name", DataType::Text).not_null()))
            .and_then(|t| t.with_column(Column::new("category", DataType::Text)))
            .and_then(|t| t.with_column(Column::new("price", DataType::Float)))
            .unwrap();
        storage.create_table(table, false).unwrap();

        for (name, category, price) in [("apple", "fruit", 1.5), ("pear", "fruit", 2.0), ("leek", "veg", 0.5)] {
            let row = Row::new().with("name", name).with("category", category).with("price", price);
            storage.insert_row("items", row).unwrap();
        }
        storage
    }

    #[test]
    fn table_lifecycle() {
        let storage = storage();
        assert!(storage.table_exists("items").unwrap());
        assert_eq!(storage.get_table("items").unwrap().column_names(), vec!["id", "name", "category", "price"]);

        let again = Table::new("items").with_column(Column::new("id", DataType::Integer)).unwrap();
        assert!(matches!(
            storage.create_table(again.clone(), false),
            Err(StorageError::TableAlreadyExists(_))
        ));
        assert!(storage.create_table(again, true).is_ok());

        storage.drop_table("items", false).unwrap();
        assert!(!storage.table_exists("items").unwrap());
        assert!(storage.drop_table("items", true).is_ok());
        assert!(matches!(storage.drop_table("items", false), Err(StorageError::TableNotFound(_))));
    }

    #[test]
    fn assigns_sequential_ids_and_fills_nulls() {
        let storage = storage();
        let row = storage.insert_row("items", Row::new().with("name", "kale")).unwrap();

        assert_eq!(row.get("id"), Some(&Value::Integer(4)));
        assert_eq!(row.get("category"), Some(&Value::Null));
    }

    #[test]
    fn explicit_ids_advance_the_counter() {
        let storage = storage();
        storage.insert_row("items", Row::new().with("id", 10).with("name", "fig")).unwrap();
        let row = storage.insert_row("items", Row::new().with("name", "date")).unwrap();
        assert_eq!(row.get("id"), Some(&Value::Integer(11)));

        let duplicate = storage.insert_row("items", Row::new().with("id", 10).with("name", "x"));
        assert!(matches!(duplicate, Err(StorageError::PrimaryKeyViolation)));
    }

    #[test]
    fn unique_columns_reject_duplicates_but_allow_nulls() {
        let storage = MemoryStorage::new();
        let table = Table::new("users")
            .with_column(Column::new("id", DataType::Integer).primary_key())
            .and_then(|t| t.with_column(Column::new("email", DataType::Text).unique()))
            .unwrap();
        storage.create_table(table, false).unwrap();

        storage.insert_row("users", Row::new().with("email", "a@example.com")).unwrap();
        assert!(matches!(
            storage.insert_row("users", Row::new().with("email", "a@example.com")),
            Err(StorageError::UniqueViolation(column)) if column == "email"
        ));

        storage.insert_row("users", Row::new()).unwrap();
        let row = storage.insert_row("users", Row::new().with("email", Value::Null)).unwrap();
        // 失敗した挿入は採番を進めない
        assert_eq!(row.get("id"), Some(&Value::Integer(3)));
    }

    #[test]
    fn rejects_wrong_types_and_missing_required_columns() {
        let storage = storage();
        assert!(matches!(
            storage.insert_row("items", Row::new().with("name", 5)),
            Err(StorageError::TypeMismatch { .. })
        ));
        assert!(matches!(
            storage.insert_row("items", Row::new().with("category", "veg")),
            Err(StorageError::NotNullViolation(_))
        ));
    }

    #[test]
    fn unknown_filter_columns_are_errors() {
        let storage = storage();
        let query = Query::new("items").where_eq("colour", "red");
        assert!(matches!(
            storage.select_rows(&query),
            Err(StorageError::ColumnNotFound(column, _)) if column == "colour"
        ));
    }

    #[test]
    fn groups_with_counts_in_first_seen_order() {
        let storage = storage();
        let query = Query::new("items")
            .select(vec![
                SelectItem::Column("category".into()),
                SelectItem::CountAll { alias: "total".into() },
            ])
            .group_by(["category"]);

        let rows = storage.select_rows(&query).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("category"), Some(&Value::from("fruit")));
        assert_eq!(rows[0].get("total"), Some(&Value::Integer(2)));
        assert_eq!(rows[1].get("total"), Some(&Value::Integer(1)));
    }

    #[test]
    fn orders_then_windows() {
        let storage = storage();
        let query = Query::new("items")
            .order_by("price", SortDirection::Desc)
            .offset(1)
            .limit(1);

        let rows = storage.select_rows(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("apple")));
    }

    #[test]
    fn max_ignores_nulls_and_empty_sets() {
        let storage = storage();
        let query = Query::new("items");
        assert_eq!(storage.max_value(&query, "price").unwrap(), Some(Value::Float(2.0)));

        storage.truncate("items").unwrap();
        assert_eq!(storage.max_value(&query, "price").unwrap(), None);
        let row = storage.insert_row("items", Row::new().with("name", "new")).unwrap();
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn updates_and_deletes_matching_rows() {
        let storage = storage();
        let fruit = Query::new("items").where_eq("category", "fruit");

        assert_eq!(storage.update_rows(&fruit, &[("price".into(), Value::Float(3.0))]).unwrap(), 2);
        assert_eq!(storage.delete_rows(&fruit).unwrap(), 2);
        assert_eq!(storage.count_rows(&Query::new("items")).unwrap(), 1);
    }

    #[test]
    fn null_comparisons_never_match() {
        let row = Row::new().with("name", Value::Null);
        assert!(!eval_filter(&row, &FilterCondition::simple("name", FilterOperator::NotEqual, "x")));
        assert!(!eval_filter(&row, &FilterCondition::simple("name", FilterOperator::Like, "%%")));
        assert!(eval_filter(&row, &FilterCondition::IsNull("name".into())));
    }
}
