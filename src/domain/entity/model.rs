use serde::de::DeserializeOwned;

use crate::domain::entity::table::Row;

/// リポジトリが扱うエンティティ
///
/// 行はserdeでデシリアライズされるため、フィールド名はカラム名と一致させる。
/// タイムスタンプはRFC 3339形式の文字列として渡される。
pub trait Entity: DeserializeOwned + Send + Sync {
    /// 対応するテーブル名
    const TABLE: &'static str;

    /// 論理削除（`deleted_at` カラム）を使うかどうか
    const SOFT_DELETES: bool = false;

    /// 行からエンティティを復元する
    fn from_row(row: &Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(row.to_json())
    }
}
