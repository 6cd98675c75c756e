use std::fmt;

use itertools::Itertools;

use crate::domain::entity::Value;
use crate::domain::query::filter::{FilterCondition, FilterOperator, SortDirection};

/// 論理削除された行の扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrashedScope {
    /// 論理削除された行を除外する
    #[default]
    Exclude,
    /// 論理削除された行も含める
    With,
    /// 論理削除された行だけを対象にする
    Only,
}

/// 条件をつなぐ論理演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub boolean: Boolean,
    pub condition: FilterCondition,
}

/// SELECT句の要素
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Column(String),
    /// `count(*) as alias`
    CountAll { alias: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// 永続化エンジンに渡すクエリハンドル
///
/// 実行はしない。条件を積み上げ、[`PersistenceEngine`](crate::domain::repository::PersistenceEngine)
/// がそれを解釈する。
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    soft_delete_column: Option<String>,
    trashed: TrashedScope,
    clauses: Vec<Clause>,
    orders: Vec<OrderBy>,
    groups: Vec<String>,
    select: Vec<SelectItem>,
    limit: Option<usize>,
    offset: Option<usize>,
    lock_for_update: bool,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            soft_delete_column: None,
            trashed: TrashedScope::Exclude,
            clauses: Vec::new(),
            orders: Vec::new(),
            groups: Vec::new(),
            select: Vec::new(),
            limit: None,
            offset: None,
            lock_for_update: false,
        }
    }

    /// 論理削除カラムを設定する（スコープが有効になる）
    pub fn soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedScope::With;
        self
    }

    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedScope::Only;
        self
    }

    /// AND条件を追加する
    pub fn and_where(self, column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.push(Boolean::And, FilterCondition::simple(column, operator, value))
    }

    /// OR条件を追加する
    pub fn or_where(self, column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.push(Boolean::Or, FilterCondition::simple(column, operator, value))
    }

    /// 等価条件を追加する（NULLは `is null` になる）
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => self.push(Boolean::And, FilterCondition::IsNull(column.into())),
            value => self.and_where(column, FilterOperator::Equal, value),
        }
    }

    /// 括弧でくくった条件グループをANDで追加する
    /// グループが空なら何も追加しない
    pub fn where_group(self, build: impl FnOnce(Query) -> Query) -> Self {
        let group = build(Query::new(self.table.clone()));
        match group.user_predicate() {
            Some(condition) => self.push(Boolean::And, condition),
            None => self,
        }
    }

    pub fn where_condition(self, condition: FilterCondition) -> Self {
        self.push(Boolean::And, condition)
    }

    fn push(mut self, boolean: Boolean, condition: FilterCondition) -> Self {
        self.clauses.push(Clause { boolean, condition });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.orders.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn select(mut self, items: Vec<SelectItem>) -> Self {
        self.select = items;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// ページ番号（1始まり）からlimit/offsetを設定する
    pub fn for_page(self, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        self.offset((page - 1).saturating_mul(per_page)).limit(per_page)
    }

    /// 行ロックを要求する（スコープはエンジンのトランザクション）
    pub fn lock_for_update(mut self) -> Self {
        self.lock_for_update = true;
        self
    }

    /// 並び順・件数制限を外したクエリ（件数カウント用）
    pub fn without_window(&self) -> Self {
        let mut query = self.clone();
        query.orders.clear();
        query.limit = None;
        query.offset = None;
        query
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn trashed(&self) -> TrashedScope {
        self.trashed
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn orders(&self) -> &[OrderBy] {
        &self.orders
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn select_items(&self) -> &[SelectItem] {
        &self.select
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<usize> {
        self.offset
    }

    pub fn is_locked(&self) -> bool {
        self.lock_for_update
    }

    /// 論理削除スコープを含めた最終的な条件
    pub fn predicate(&self) -> Option<FilterCondition> {
        let scope = match (&self.soft_delete_column, self.trashed) {
            (Some(column), TrashedScope::Exclude) => Some(FilterCondition::IsNull(column.clone())),
            (Some(column), TrashedScope::Only) => Some(FilterCondition::NotNull(column.clone())),
            _ => None,
        };

        match (self.user_predicate(), scope) {
            (Some(user), Some(scope)) => Some(FilterCondition::And(vec![user, scope])),
            (user, scope) => user.or(scope),
        }
    }

    // SQLと同じくANDはORより強く結合する: a and b or c => (a and b) or c
    fn user_predicate(&self) -> Option<FilterCondition> {
        let mut groups: Vec<Vec<FilterCondition>> = Vec::new();
        for clause in &self.clauses {
            match (clause.boolean, groups.last_mut()) {
                (Boolean::And, Some(group)) => group.push(clause.condition.clone()),
                _ => groups.push(vec![clause.condition.clone()]),
            }
        }

        let mut ors: Vec<FilterCondition> = groups
            .into_iter()
            .map(|mut group| {
                if group.len() == 1 {
                    group.remove(0)
                } else {
                    FilterCondition::And(group)
                }
            })
            .collect();

        match ors.len() {
            0 => None,
            1 => ors.pop(),
            _ => Some(FilterCondition::Or(ors)),
        }
    }

    /// 実行用ではなく確認・エクスポート用のSQL表現
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("select ");

        if self.select.is_empty() {
            sql.push('*');
        } else {
            let mut items = self.select.iter().map(|item| match item {
                SelectItem::Column(column) => format!("`{}`", column),
                SelectItem::CountAll { alias } => format!("count(*) as {}", alias),
            });
            sql.push_str(&items.join(", "));
        }

        sql.push_str(&format!(" from `{}`", self.table));

        if let Some(predicate) = self.predicate() {
            sql.push_str(" where ");
            sql.push_str(&predicate.to_sql());
        }

        if !self.groups.is_empty() {
            sql.push_str(" group by ");
            sql.push_str(&self.groups.iter().map(|g| format!("`{}`", g)).join(", "));
        }

        if !self.orders.is_empty() {
            sql.push_str(" order by ");
            let mut orders = self
                .orders
                .iter()
                .map(|o| format!("`{}` {}", o.column, o.direction));
            sql.push_str(&orders.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" offset {}", offset));
        }
        if self.lock_for_update {
            sql.push_str(" for update");
        }

        sql
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}
