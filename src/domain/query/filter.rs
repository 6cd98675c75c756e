use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::domain::entity::Value;

/// クエリフィルター条件
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// 単一条件（カラム名、演算子、値）
    Simple {
        column: String,
        operator: FilterOperator,
        value: Value,
    },

    /// `column IS NULL`
    IsNull(String),

    /// `column IS NOT NULL`
    NotNull(String),

    /// 複数条件（ANDまたはOR）
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
}

impl FilterCondition {
    pub fn simple(column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        FilterCondition::Simple {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// SQLの条件式として描画する
    pub fn to_sql(&self) -> String {
        match self {
            FilterCondition::Simple { column, operator, value } => {
                format!("`{}` {} {}", column, operator.as_sql(), sql_literal(value))
            }
            FilterCondition::IsNull(column) => format!("`{}` is null", column),
            FilterCondition::NotNull(column) => format!("`{}` is not null", column),
            FilterCondition::And(conditions) => group_sql(conditions, " and "),
            FilterCondition::Or(conditions) => group_sql(conditions, " or "),
        }
    }
}

fn group_sql(conditions: &[FilterCondition], separator: &str) -> String {
    match conditions {
        [] => String::new(),
        [single] => single.to_sql(),
        many => format!("({})", many.iter().map(FilterCondition::to_sql).join(separator)),
    }
}

/// SQLリテラルとして描画する
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => value.to_string(),
        Value::Null => "null".to_string(),
        Value::Text(_) | Value::Timestamp(_) => {
            format!("'{}'", value.to_string().replace('\'', "''"))
        }
    }
}

/// フィルター演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FilterOperator {
    #[strum(serialize = "=", serialize = "==")]
    Equal,
    #[strum(serialize = "!=", serialize = "<>")]
    NotEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessOrEqual,
    #[strum(serialize = "like")]
    Like,
    #[strum(serialize = "not like")]
    NotLike,
}

impl FilterOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "!=",
            FilterOperator::Greater => ">",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::Less => "<",
            FilterOperator::LessOrEqual => "<=",
            FilterOperator::Like => "like",
            FilterOperator::NotLike => "not like",
        }
    }
}

/// 並び順
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[display(fmt = "asc")]
    #[strum(serialize = "asc")]
    Asc,
    #[display(fmt = "desc")]
    #[strum(serialize = "desc")]
    Desc,
}
