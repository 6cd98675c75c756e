use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// カラムが保持できるデータ型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum DataType {
    #[display(fmt = "INTEGER")]
    Integer,

    #[display(fmt = "FLOAT")]
    Float,

    #[display(fmt = "TEXT")]
    Text,

    #[display(fmt = "BOOLEAN")]
    Boolean,

    #[display(fmt = "TIMESTAMP")]
    Timestamp,

    #[display(fmt = "NULL")]
    Null,
}

impl DataType {
    /// 型 `other` の値をこのカラムに格納できるかどうか
    /// IntegerはFloatカラムに入れられる（SQLと同じ拡大変換）
    pub fn accepts(&self, other: DataType) -> bool {
        *self == other
            || other == DataType::Null
            || (*self == DataType::Float && other == DataType::Integer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    // 主キー制約（自動採番の対象）
    PrimaryKey,
    // NOT NULL 制約
    NotNull,
    // ユニーク制約
    Unique,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::PrimaryKey => write!(f, "PRIMARY KEY"),
            Constraint::NotNull => write!(f, "NOT NULL"),
            Constraint::Unique => write!(f, "UNIQUE"),
        }
    }
}
