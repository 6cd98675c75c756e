use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use typed_builder::TypedBuilder;

use crate::domain::query::filter::SortDirection;
use crate::domain::query::spec::{FilterError, Filters};

/// 1ページあたりの既定件数
pub const DEFAULT_PER_PAGE: usize = 20;

/// 一覧取得のオプション
#[derive(Debug, Clone, Default, PartialEq, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct ListOptions {
    /// 並び替えるカラム
    #[builder(default, setter(strip_option, into))]
    pub order: Option<String>,

    #[builder(default, setter(strip_option))]
    pub sort: Option<SortDirection>,

    /// 作成日時の下限（その日の始まりを含む）
    #[builder(default, setter(strip_option))]
    pub from: Option<NaiveDate>,

    /// 作成日時の上限（その日の終わりを含む）
    #[builder(default, setter(strip_option))]
    pub to: Option<NaiveDate>,

    #[builder(default, setter(strip_option))]
    pub active: Option<bool>,

    /// 全カラムに対する部分一致検索
    #[builder(default, setter(strip_option, into))]
    pub keyword: Option<String>,
}

impl ListOptions {
    pub fn from_json(map: &Map<String, Json>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Json::Object(map.clone()))
    }
}

/// ページングのオプション
#[derive(Debug, Clone, PartialEq, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct PaginationOptions {
    #[serde(rename = "perPage")]
    #[builder(default = DEFAULT_PER_PAGE)]
    pub per_page: usize,

    /// 1始まりのページ番号
    #[builder(default = 1)]
    pub page: usize,

    /// 実行せずにクエリハンドルを返す
    #[builder(default)]
    pub export: bool,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            page: 1,
            export: false,
        }
    }
}

impl PaginationOptions {
    pub fn from_json(map: &Map<String, Json>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Json::Object(map.clone()))
    }
}

/// 一覧に追加する絞り込み条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    pub filters: Filters,
    /// 論理削除された行だけを対象にする
    pub trash: bool,
}

impl Conditions {
    pub fn new(filters: Filters) -> Self {
        Self { filters, trash: false }
    }

    pub fn trashed(mut self) -> Self {
        self.trash = true;
        self
    }

    /// `trash` キーを取り除いてから残りをフィルターとして解釈する
    pub fn from_json(map: &Map<String, Json>) -> Result<Self, FilterError> {
        let trash = map.get("trash").map(is_truthy).unwrap_or(false);
        let mut rest = map.clone();
        rest.remove("trash");

        Ok(Self {
            filters: Filters::from_json(&rest)?,
            trash,
        })
    }
}

// 空文字・"0"・0・false・null・空配列は偽
fn is_truthy(json: &Json) -> bool {
    match json {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Json::String(s) => !(s.is_empty() || s == "0"),
        Json::Array(items) => !items.is_empty(),
        Json::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::spec::FilterSpec;
    use serde_json::json;

    #[test]
    fn list_options_deserialize_from_loose_map() {
        let json = json!({"order": "name", "sort": "asc", "from": "2024-01-31", "active": true, "perPage": 5});
        let options = ListOptions::from_json(json.as_object().unwrap()).unwrap();

        assert_eq!(options.order.as_deref(), Some("name"));
        assert_eq!(options.sort, Some(SortDirection::Asc));
        assert_eq!(options.from, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(options.active, Some(true));
        assert!(options.keyword.is_none());
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let json = json!({"from": "31/01/2024"});
        assert!(ListOptions::from_json(json.as_object().unwrap()).is_err());
    }

    #[test]
    fn pagination_defaults() {
        let options = PaginationOptions::from_json(&Map::new()).unwrap();
        assert_eq!(options, PaginationOptions::default());
        assert_eq!(options.per_page, 20);

        let built = PaginationOptions::builder().per_page(2).build();
        assert_eq!(built.page, 1);
        assert!(!built.export);
    }

    #[test]
    fn trash_flag_is_stripped_from_conditions() {
        let json = json!({"trash": 1, "status": "archived"});
        let conditions = Conditions::from_json(json.as_object().unwrap()).unwrap();

        assert!(conditions.trash);
        assert_eq!(conditions.filters.spec, FilterSpec::equality([("status", "archived")]));
    }

    #[test]
    fn falsy_trash_values() {
        for falsy in [json!(0), json!(""), json!("0"), json!(false), json!(null)] {
            let conditions = Conditions::from_json(json!({"trash": falsy}).as_object().unwrap()).unwrap();
            assert!(!conditions.trash);
        }
    }
}
