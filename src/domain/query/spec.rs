use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::domain::entity::{Value, ValueError};
use crate::domain::query::filter::{FilterOperator, SortDirection};

/// フィルターとして扱わない予約キー
pub const RESERVED_KEYS: [&str; 3] = ["order", "sort", "page"];

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("Unknown operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("Field '{0}' must map comparison values to operators")]
    ExpectedOperatorMap(String),

    #[error("Invalid value for field '{field}': {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: ValueError,
    },

    #[error("'order' must be a column name")]
    InvalidOrder,

    #[error("Invalid sort direction '{0}'")]
    InvalidSort(String),

    #[error("Filters must be a JSON object")]
    NotAnObject,
}

/// フィルターの形
///
/// - `Equality`: フィールド = 値 をANDで結合する
/// - `Operator`: フィールドごとに (比較値, 演算子) の組を持つ
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Equality(BTreeMap<String, Value>),
    Operator(BTreeMap<String, Vec<(Value, FilterOperator)>>),
}

impl Default for FilterSpec {
    fn default() -> Self {
        FilterSpec::Equality(BTreeMap::new())
    }
}

impl FilterSpec {
    pub fn equality<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        FilterSpec::Equality(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn operators<I, K, V>(triples: I) -> Self
    where
        I: IntoIterator<Item = (K, V, FilterOperator)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut fields: BTreeMap<String, Vec<(Value, FilterOperator)>> = BTreeMap::new();
        for (field, value, operator) in triples {
            fields.entry(field.into()).or_default().push((value.into(), operator));
        }
        FilterSpec::Operator(fields)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FilterSpec::Equality(fields) => fields.is_empty(),
            FilterSpec::Operator(fields) => fields.is_empty(),
        }
    }

    /// 対象となるフィールド名
    pub fn fields(&self) -> Vec<&str> {
        match self {
            FilterSpec::Equality(fields) => fields.keys().map(String::as_str).collect(),
            FilterSpec::Operator(fields) => fields.keys().map(String::as_str).collect(),
        }
    }
}

/// フィルターと並び順
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub spec: FilterSpec,
    pub order: Option<String>,
    pub sort: SortDirection,
}

impl Filters {
    pub fn new(spec: FilterSpec) -> Self {
        Self {
            spec,
            ..Self::default()
        }
    }

    pub fn ordered(mut self, column: impl Into<String>, sort: SortDirection) -> Self {
        self.order = Some(column.into());
        self.sort = sort;
        self
    }

    /// JSONオブジェクト形式のフィルターを解釈する
    ///
    /// `order`/`sort`/`page` を取り除いた後、値のどこかにネストがあれば
    /// 全体を `Operator` 形式、なければ `Equality` 形式として扱う。
    pub fn from_json(map: &Map<String, Json>) -> Result<Self, FilterError> {
        let order = match map.get("order") {
            None | Some(Json::Null) => None,
            Some(Json::String(column)) => Some(column.clone()),
            Some(_) => return Err(FilterError::InvalidOrder),
        };
        let sort = match map.get("sort") {
            None | Some(Json::Null) => SortDirection::Asc,
            Some(Json::String(sort)) => SortDirection::from_str(sort)
                .map_err(|_| FilterError::InvalidSort(sort.clone()))?,
            Some(other) => return Err(FilterError::InvalidSort(other.to_string())),
        };

        let fields: Map<String, Json> = map
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let spec = match Dimension::of(&fields) {
            Dimension::One => equality_spec(&fields)?,
            Dimension::Two => operator_spec(&fields)?,
        };

        Ok(Self { spec, order, sort })
    }

    pub fn from_value(json: &Json) -> Result<Self, FilterError> {
        match json {
            Json::Object(map) => Self::from_json(map),
            _ => Err(FilterError::NotAnObject),
        }
    }
}

/// フィルターの次元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    One,
    Two,
}

impl Dimension {
    /// 再帰的な要素数がトップレベルのキー数を超えれば2次元
    pub fn of(fields: &Map<String, Json>) -> Self {
        if count_recursive(fields.values()) > fields.len() {
            Dimension::Two
        } else {
            Dimension::One
        }
    }
}

fn count_recursive<'a>(values: impl Iterator<Item = &'a Json>) -> usize {
    values
        .map(|value| {
            1 + match value {
                Json::Object(map) => count_recursive(map.values()),
                Json::Array(items) => count_recursive(items.iter()),
                _ => 0,
            }
        })
        .sum()
}

fn equality_spec(fields: &Map<String, Json>) -> Result<FilterSpec, FilterError> {
    let mut equality = BTreeMap::new();
    for (field, json) in fields {
        let value = Value::from_json(json).map_err(|source| FilterError::InvalidValue {
            field: field.clone(),
            source,
        })?;
        equality.insert(field.clone(), value);
    }
    Ok(FilterSpec::Equality(equality))
}

fn operator_spec(fields: &Map<String, Json>) -> Result<FilterSpec, FilterError> {
    let mut operators = BTreeMap::new();
    for (field, json) in fields {
        let pairs = match json {
            Json::Object(pairs) => pairs,
            _ => return Err(FilterError::ExpectedOperatorMap(field.clone())),
        };

        let mut constraints = Vec::with_capacity(pairs.len());
        for (comparison, operator) in pairs {
            let operator = operator
                .as_str()
                .and_then(|op| FilterOperator::from_str(op).ok())
                .ok_or_else(|| FilterError::UnknownOperator {
                    field: field.clone(),
                    operator: operator.to_string(),
                })?;
            constraints.push((key_value(comparison), operator));
        }
        operators.insert(field.clone(), constraints);
    }
    Ok(FilterSpec::Operator(operators))
}

// オブジェクトのキーは文字列なので、整数に見えるものは整数として扱う
fn key_value(key: &str) -> Value {
    match key.parse::<i64>() {
        Ok(i) if i.to_string() == key => Value::Integer(i),
        _ => Value::Text(key.to_string()),
    }
}
