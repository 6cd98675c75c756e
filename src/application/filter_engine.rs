//! フィルター指定をクエリ条件に変換する

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;

use crate::application::config::RepositoryConfig;
use crate::domain::entity::Value;
use crate::domain::query::{FilterOperator, FilterSpec, Filters, ListOptions, Query};

/// フィルターをクエリに適用する
///
/// フィルターが空ならクエリをそのまま返す（並び順も付けない）。
/// `apply_order` が真で `order` があれば、条件の後に並び順を付ける。
pub fn apply_filters(query: Query, filters: &Filters, apply_order: bool) -> Query {
    if filters.spec.is_empty() {
        return query;
    }

    let query = match &filters.spec {
        FilterSpec::Equality(fields) => query.where_group(|group| {
            fields
                .iter()
                .fold(group, |q, (field, value)| q.where_eq(field.as_str(), value.clone()))
        }),
        FilterSpec::Operator(fields) => fields.iter().fold(query, |query, (field, pairs)| {
            pairs.iter().fold(query, |q, (value, operator)| match operator {
                FilterOperator::Like => q.and_where(field.as_str(), FilterOperator::Like, contains_pattern(value)),
                _ => q.and_where(field.as_str(), *operator, value.clone()),
            })
        }),
    };

    let query = match (&filters.order, apply_order) {
        (Some(order), true) => query.order_by(order.as_str(), filters.sort),
        _ => query,
    };

    debug!(sql = %query, "filters applied");
    query
}

/// 日付・状態・キーワードの条件を付ける（並び順は付けない）
///
/// `columns` はキーワード検索の対象で、`keyword` がないときは参照しない。
pub fn apply_list_options(
    query: Query,
    options: &ListOptions,
    config: &RepositoryConfig,
    timezone: FixedOffset,
    columns: &[String],
) -> Query {
    let mut query = query;

    if let Some(from) = options.from {
        query = query.and_where(
            config.created_at_column.as_str(),
            FilterOperator::GreaterOrEqual,
            start_of_day(from, timezone),
        );
    }

    if let Some(to) = options.to {
        query = query.and_where(
            config.created_at_column.as_str(),
            FilterOperator::LessOrEqual,
            end_of_day(to, timezone),
        );
    }

    if let Some(active) = options.active {
        query = query.where_eq(config.active_column.as_str(), active);
    }

    if let Some(keyword) = &options.keyword {
        let pattern = format!("%{}%", keyword);
        query = query.where_group(|group| {
            columns.iter().fold(group, |q, column| {
                q.or_where(column.as_str(), FilterOperator::Like, pattern.as_str())
            })
        });
    }

    query
}

fn contains_pattern(value: &Value) -> Value {
    Value::Text(format!("%{}%", value))
}

/// タイムゾーン上のその日の 00:00:00 をUTCで返す
pub fn start_of_day(date: NaiveDate, timezone: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(timezone.local_minus_utc() as i64)))
}

/// タイムゾーン上のその日の 23:59:59.999999 をUTCで返す
pub fn end_of_day(date: NaiveDate, timezone: FixedOffset) -> DateTime<Utc> {
    start_of_day(date, timezone) + Duration::days(1) - Duration::microseconds(1)
}
