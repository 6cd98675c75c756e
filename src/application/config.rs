use serde::Deserialize;

/// リポジトリが前提とするカラム名などの設定
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// 主キー（一覧の既定の並び順にも使う）
    pub id_column: String,

    /// `from`/`to` で絞り込む作成日時
    pub created_at_column: String,

    /// `active` で絞り込む状態フラグ
    pub active_column: String,

    /// `next_priority` が参照するカラム
    pub priority_column: String,

    /// 論理削除の日時
    pub deleted_at_column: String,

    /// カラム一覧をプロセスの間キャッシュする
    pub cache_columns: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            created_at_column: "created_at".to_string(),
            active_column: "is_active".to_string(),
            priority_column: "priority".to_string(),
            deleted_at_column: "deleted_at".to_string(),
            cache_columns: true,
        }
    }
}

impl RepositoryConfig {
    /// JSON文字列から読み込む（省略したキーは既定値）
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
