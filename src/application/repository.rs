use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::application::config::RepositoryConfig;
use crate::application::filter_engine::{apply_filters, apply_list_options};
use crate::domain::entity::{Entity, Row, Value};
use crate::domain::query::{
    Conditions, Filters, ListOptions, PaginationOptions, Paginated, Query, SelectItem, SortDirection,
};
use crate::domain::repository::{PersistenceEngine, Repository, RepositoryError};

/// 任意のエンティティ型に対する汎用リポジトリ
///
/// 状態はカラム一覧のキャッシュだけで、各操作は毎回新しいクエリを組み立てる。
pub struct BaseRepository<E: Entity> {
    engine: Arc<dyn PersistenceEngine>,
    config: RepositoryConfig,
    schema_columns: OnceCell<Vec<String>>,
    searchable_columns: OnceCell<Vec<String>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> BaseRepository<E> {
    pub fn new(engine: Arc<dyn PersistenceEngine>) -> Self {
        Self::with_config(engine, RepositoryConfig::default())
    }

    pub fn with_config(engine: Arc<dyn PersistenceEngine>, config: RepositoryConfig) -> Self {
        Self {
            engine,
            config,
            schema_columns: OnceCell::new(),
            searchable_columns: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// 論理削除スコープつきの新しいクエリ
    pub fn new_query(&self) -> Query {
        let query = Query::new(E::TABLE);
        if E::SOFT_DELETES {
            query.soft_deletes(self.config.deleted_at_column.as_str())
        } else {
            query
        }
    }

    fn by_id(&self, id: i64) -> Query {
        self.new_query().where_eq(self.config.id_column.as_str(), id)
    }

    fn not_found(&self, id: i64) -> RepositoryError {
        RepositoryError::NotFound {
            table: E::TABLE.to_string(),
            id,
        }
    }

    fn decode(&self, row: &Row) -> Result<E, RepositoryError> {
        E::from_row(row).map_err(|source| RepositoryError::Decode {
            table: E::TABLE.to_string(),
            source,
        })
    }

    fn decode_all(&self, rows: Vec<Row>) -> Result<Vec<E>, RepositoryError> {
        rows.iter().map(|row| self.decode(row)).collect()
    }

    /// スキーマ上のカラム一覧
    async fn schema_columns(&self) -> Result<Vec<String>, RepositoryError> {
        if !self.config.cache_columns {
            return Ok(self.engine.list_columns(E::TABLE).await?);
        }
        let columns = self
            .schema_columns
            .get_or_try_init(|| self.engine.list_columns(E::TABLE))
            .await?;
        Ok(columns.clone())
    }

    /// キーワード検索の対象カラム
    async fn keyword_columns(&self) -> Result<Vec<String>, RepositoryError> {
        if !self.config.cache_columns {
            return Ok(self.engine.searchable_columns(E::TABLE).await?);
        }
        let columns = self
            .searchable_columns
            .get_or_try_init(|| self.engine.searchable_columns(E::TABLE))
            .await?;
        Ok(columns.clone())
    }

    async fn constrain(&self, query: Query, options: &ListOptions) -> Result<Query, RepositoryError> {
        let columns = match options.keyword {
            Some(_) => self.keyword_columns().await?,
            None => Vec::new(),
        };
        Ok(apply_list_options(
            query,
            options,
            &self.config,
            self.engine.timezone(),
            &columns,
        ))
    }

    /// 論理削除なら `deleted_at` を更新し、そうでなければ物理削除する
    async fn remove(&self, query: &Query) -> Result<usize, RepositoryError> {
        let affected = if E::SOFT_DELETES {
            let stamp = vec![(self.config.deleted_at_column.clone(), Value::from(Utc::now()))];
            self.engine.update(query, &stamp).await?
        } else {
            self.engine.delete(query).await?
        };
        Ok(affected)
    }
}

#[async_trait]
impl<E: Entity> Repository for BaseRepository<E> {
    type Entity = E;

    async fn find(&self, id: i64, trash: bool) -> Result<E, RepositoryError> {
        let query = if trash { self.by_id(id).with_trashed() } else { self.by_id(id) };
        match self.engine.first(&query).await? {
            Some(row) => self.decode(&row),
            None => Err(self.not_found(id)),
        }
    }

    async fn find_one(&self, filters: &Filters, trash: bool) -> Result<Option<E>, RepositoryError> {
        let query = if trash { self.new_query().with_trashed() } else { self.new_query() };
        let query = apply_filters(query, filters, true);
        self.engine
            .first(&query)
            .await?
            .map(|row| self.decode(&row))
            .transpose()
    }

    async fn find_and_lock(&self, id: i64) -> Result<Option<E>, RepositoryError> {
        let query = self.by_id(id).lock_for_update();
        self.engine
            .first(&query)
            .await?
            .map(|row| self.decode(&row))
            .transpose()
    }

    async fn create(&self, data: Row) -> Result<E, RepositoryError> {
        let row = self.engine.insert(E::TABLE, data).await?;
        info!(table = E::TABLE, id = ?row.get(&self.config.id_column), "record created");
        self.decode(&row)
    }

    async fn update(&self, data: Row, id: i64) -> Result<bool, RepositoryError> {
        let query = self.by_id(id);
        if self.engine.first(&query).await?.is_none() {
            return Err(self.not_found(id));
        }
        let affected = self.engine.update(&query, &data.assignments()).await?;
        info!(table = E::TABLE, id, "record updated");
        Ok(affected > 0)
    }

    async fn update_by(&self, conditions: &Filters, data: Row) -> Result<usize, RepositoryError> {
        let query = apply_filters(self.new_query(), conditions, true);
        let affected = self.engine.update(&query, &data.assignments()).await?;
        info!(table = E::TABLE, affected, "records updated");
        Ok(affected)
    }

    async fn update_or_create(&self, conditions: Row, data: Row) -> Result<E, RepositoryError> {
        let query = conditions
            .values
            .iter()
            .fold(self.new_query(), |q, (column, value)| q.where_eq(column.as_str(), value.clone()));

        let existing = match self.engine.first(&query).await? {
            Some(row) => row,
            None => {
                let mut row = conditions;
                row.merge(&data);
                return self.create(row).await;
            }
        };

        match existing.get(&self.config.id_column).and_then(Value::as_i64) {
            Some(id) => {
                self.engine.update(&self.by_id(id), &data.assignments()).await?;
                info!(table = E::TABLE, id, "record updated");
                self.find(id, false).await
            }
            None => {
                self.engine.update(&query, &data.assignments()).await?;
                let mut row = existing;
                row.merge(&data);
                self.decode(&row)
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let query = self.by_id(id);
        if self.engine.first(&query).await?.is_none() {
            return Err(self.not_found(id));
        }
        let affected = self.remove(&query).await?;
        info!(table = E::TABLE, id, soft = E::SOFT_DELETES, "record deleted");
        Ok(affected > 0)
    }

    async fn delete_by(&self, conditions: &Filters) -> Result<usize, RepositoryError> {
        let query = apply_filters(self.new_query(), conditions, true);
        let affected = self.remove(&query).await?;
        info!(table = E::TABLE, affected, soft = E::SOFT_DELETES, "records deleted");
        Ok(affected)
    }

    async fn delete_all(&self) -> Result<usize, RepositoryError> {
        let affected = if E::SOFT_DELETES {
            self.remove(&self.new_query().with_trashed()).await?
        } else {
            self.engine.truncate(E::TABLE).await?
        };
        info!(table = E::TABLE, affected, soft = E::SOFT_DELETES, "all records deleted");
        Ok(affected)
    }

    async fn grouping(&self, fields: &[&str], options: &ListOptions) -> Result<Vec<Row>, RepositoryError> {
        let mut select: Vec<SelectItem> = fields
            .iter()
            .map(|field| SelectItem::Column(field.to_string()))
            .collect();
        select.push(SelectItem::CountAll {
            alias: "total".to_string(),
        });

        let mut query = self.new_query().select(select).group_by(fields.iter().copied());

        if let Some(order) = options.order.as_deref().filter(|order| fields.contains(order)) {
            query = query.order_by(order, options.sort.unwrap_or(SortDirection::Asc));
        }

        debug!(sql = %query, "grouping");
        Ok(self.engine.get(&query).await?)
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<E>, RepositoryError> {
        let order = options.order.clone().unwrap_or_else(|| self.config.id_column.clone());
        let sort = options.sort.unwrap_or(SortDirection::Desc);

        let query = self.constrain(self.new_query(), options).await?;
        let query = query.order_by(order, sort);

        debug!(sql = %query, "list");
        let rows = self.engine.get(&query).await?;
        self.decode_all(rows)
    }

    async fn list_paginated(
        &self,
        options: &ListOptions,
        pagination: &PaginationOptions,
        conditions: &Conditions,
    ) -> Result<Paginated<E>, RepositoryError> {
        let order = options.order.clone().ok_or_else(|| {
            warn!(table = E::TABLE, "list_paginated called without order");
            RepositoryError::MissingParameter("order")
        })?;
        let sort = options.sort.ok_or_else(|| {
            warn!(table = E::TABLE, "list_paginated called without sort");
            RepositoryError::MissingParameter("sort")
        })?;
        if pagination.per_page == 0 {
            return Err(RepositoryError::InvalidOption("perPage must be at least 1".to_string()));
        }

        let mut query = self.new_query();
        if conditions.trash {
            if !E::SOFT_DELETES {
                return Err(RepositoryError::InvalidOption(format!(
                    "{} does not support soft deletes",
                    E::TABLE
                )));
            }
            query = query.only_trashed();
        }

        let query = apply_filters(query, &conditions.filters, false);
        let query = self.constrain(query, options).await?;
        let query = query.order_by(order, sort);

        if pagination.export {
            debug!(sql = %query, "list_paginated export");
            return Ok(Paginated::Export(query));
        }

        debug!(sql = %query, per_page = pagination.per_page, page = pagination.page, "list_paginated");
        let page = self
            .engine
            .paginate(&query, pagination.per_page, pagination.page)
            .await?;
        Ok(Paginated::Page(page.try_map(|row| self.decode(&row))?))
    }

    async fn get(&self, query: &Query) -> Result<Vec<E>, RepositoryError> {
        let rows = self.engine.get(query).await?;
        self.decode_all(rows)
    }

    /// `priority` の最大値 + 1（行がなければ1、カラムがなければ0）
    ///
    /// 読み取りと利用の間はロックしないため、同時に呼ぶと同じ値が返りうる。
    async fn next_priority(&self) -> Result<i64, RepositoryError> {
        let column = self.config.priority_column.as_str();
        if !self.schema_columns().await?.iter().any(|c| c == column) {
            return Ok(0);
        }

        let max = self.engine.max(&self.new_query(), column).await?;
        let current = max.as_ref().and_then(Value::as_i64).unwrap_or(0);
        Ok(current + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::{FilterSpec, Page};
    use crate::domain::repository::{EngineError, MockPersistenceEngine};
    use chrono::{FixedOffset, Offset};
    use mockall::predicate::eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Task {
        id: i64,
        title: String,
    }

    impl Entity for Task {
        const TABLE: &'static str = "tasks";
    }

    #[derive(Debug, Deserialize)]
    struct Note {
        #[allow(dead_code)]
        id: i64,
    }

    impl Entity for Note {
        const TABLE: &'static str = "notes";
        const SOFT_DELETES: bool = true;
    }

    fn repository<E: Entity>(engine: MockPersistenceEngine) -> BaseRepository<E> {
        BaseRepository::new(Arc::new(engine))
    }

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    #[tokio::test]
    async fn next_priority_adds_one_to_the_maximum() {
        let mut engine = MockPersistenceEngine::new();
        engine
            .expect_list_columns()
            .with(eq("tasks"))
            .times(1)
            .returning(|_| Ok(vec!["id".into(), "priority".into()]));
        engine
            .expect_max()
            .withf(|_, column| column == "priority")
            .returning(|_, _| Ok(Some(Value::Integer(7))));

        let repo = repository::<Task>(engine);
        assert_eq!(repo.next_priority().await.unwrap(), 8);
        // 2回目はキャッシュされたカラム一覧を使う
        assert_eq!(repo.next_priority().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn next_priority_on_empty_table_is_one() {
        let mut engine = MockPersistenceEngine::new();
        engine
            .expect_list_columns()
            .returning(|_| Ok(vec!["id".into(), "priority".into()]));
        engine.expect_max().returning(|_, _| Ok(None));

        assert_eq!(repository::<Task>(engine).next_priority().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn next_priority_without_column_is_zero() {
        let mut engine = MockPersistenceEngine::new();
        engine.expect_list_columns().returning(|_| Ok(vec!["id".into()]));
        engine.expect_max().never();

        assert_eq!(repository::<Task>(engine).next_priority().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_paginated_requires_order_and_sort_before_querying() {
        // 期待値を設定しないモックは呼ばれるとパニックする
        let repo = repository::<Task>(MockPersistenceEngine::new());

        let missing_order = ListOptions::builder().sort(SortDirection::Asc).build();
        let err = repo
            .list_paginated(&missing_order, &PaginationOptions::default(), &Conditions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MissingParameter("order")));

        let missing_sort = ListOptions::builder().order("id").build();
        let err = repo
            .list_paginated(&missing_sort, &PaginationOptions::default(), &Conditions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MissingParameter("sort")));
    }

    #[tokio::test]
    async fn keyword_columns_are_fetched_once() {
        let mut engine = MockPersistenceEngine::new();
        engine
            .expect_searchable_columns()
            .times(1)
            .returning(|_| Ok(vec!["title".into()]));
        engine.expect_timezone().returning(utc);
        engine
            .expect_get()
            .withf(|query| query.to_sql().contains("`title` like '%milk%'"))
            .times(2)
            .returning(|_| Ok(vec![Row::new().with("id", 1).with("title", "Buy milk")]));

        let repo = repository::<Task>(engine);
        let options = ListOptions::builder().keyword("milk").build();
        for _ in 0..2 {
            let tasks = repo.list(&options).await.unwrap();
            assert_eq!(tasks, vec![Task { id: 1, title: "Buy milk".into() }]);
        }
    }

    #[tokio::test]
    async fn column_cache_can_be_disabled() {
        let mut engine = MockPersistenceEngine::new();
        engine
            .expect_searchable_columns()
            .times(2)
            .returning(|_| Ok(vec!["title".into()]));
        engine.expect_timezone().returning(utc);
        engine.expect_get().returning(|_| Ok(vec![]));

        let config = RepositoryConfig {
            cache_columns: false,
            ..RepositoryConfig::default()
        };
        let repo = BaseRepository::<Task>::with_config(Arc::new(engine), config);
        let options = ListOptions::builder().keyword("x").build();
        repo.list(&options).await.unwrap();
        repo.list(&options).await.unwrap();
    }

    #[tokio::test]
    async fn list_defaults_to_id_descending() {
        let mut engine = MockPersistenceEngine::new();
        engine.expect_timezone().returning(utc);
        engine
            .expect_get()
            .withf(|query| query.to_sql() == "select * from `tasks` order by `id` desc")
            .returning(|_| Ok(vec![]));

        let tasks = repository::<Task>(engine).list(&ListOptions::default()).await.unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn paginated_conditions_skip_their_own_ordering() {
        let mut engine = MockPersistenceEngine::new();
        engine.expect_timezone().returning(utc);
        engine
            .expect_paginate()
            .withf(|query, per_page, page| {
                query.to_sql() == "select * from `tasks` where `title` = 'a' order by `id` asc"
                    && *per_page == 20
                    && *page == 1
            })
            .returning(|_, per_page, page| Ok(Page::new(vec![], 0, per_page, page)));

        let conditions = Conditions::new(
            Filters::new(FilterSpec::equality([("title", "a")])).ordered("title", SortDirection::Desc),
        );
        let options = ListOptions::builder().order("id").sort(SortDirection::Asc).build();
        let result = repository::<Task>(engine)
            .list_paginated(&options, &PaginationOptions::default(), &conditions)
            .await
            .unwrap();

        assert_eq!(result.into_page().unwrap().total, 0);
    }

    #[tokio::test]
    async fn trash_requires_soft_deletes() {
        let mut engine = MockPersistenceEngine::new();
        engine.expect_timezone().returning(utc);
        let options = ListOptions::builder().order("id").sort(SortDirection::Asc).build();
        let conditions = Conditions::default().trashed();

        let err = repository::<Task>(engine)
            .list_paginated(&options, &PaginationOptions::default(), &conditions)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidOption(_)));
    }

    #[tokio::test]
    async fn soft_delete_stamps_deleted_at() {
        let mut engine = MockPersistenceEngine::new();
        engine
            .expect_first()
            .returning(|_| Ok(Some(Row::new().with("id", 3))));
        engine
            .expect_update()
            .withf(|query, updates| {
                query.to_sql().contains("`deleted_at` is null")
                    && updates.len() == 1
                    && updates[0].0 == "deleted_at"
                    && matches!(updates[0].1, Value::Timestamp(_))
            })
            .returning(|_, _| Ok(1));
        engine.expect_delete().never();

        assert!(repository::<Note>(engine).delete(3).await.unwrap());
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let mut engine = MockPersistenceEngine::new();
        engine.expect_first().returning(|_| Ok(None));
        engine.expect_update().never();

        let repo = repository::<Task>(engine);
        assert!(matches!(
            repo.update(Row::new().with("title", "x"), 9).await,
            Err(RepositoryError::NotFound { id: 9, .. })
        ));
        assert!(matches!(
            repo.find(9, false).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn engine_errors_pass_through() {
        let mut engine = MockPersistenceEngine::new();
        engine.expect_timezone().returning(utc);
        engine
            .expect_get()
            .returning(|_| Err(EngineError::TableNotFound("tasks".into())));

        let err = repository::<Task>(engine).list(&ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Engine(EngineError::TableNotFound(_))));
    }
}
