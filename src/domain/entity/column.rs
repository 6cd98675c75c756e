use crate::domain::entity::data_type::{Constraint, DataType};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use std::fmt;

/// テーブルのカラム定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct Column {
    /// カラム名
    #[builder(setter(into))]
    pub name: String,

    /// データ型
    pub data_type: DataType,

    /// 制約
    #[builder(default)]
    pub constraints: Vec<Constraint>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    // 自動採番の主キー
    pub fn primary_key(mut self) -> Self {
        self.constraints.push(Constraint::PrimaryKey);
        self.constraints.push(Constraint::NotNull);
        self
    }

    pub fn not_null(mut self) -> Self {
        if !self.constraints.contains(&Constraint::NotNull) {
            self.constraints.push(Constraint::NotNull);
        }
        self
    }

    pub fn unique(mut self) -> Self {
        if !self.constraints.contains(&Constraint::Unique) {
            self.constraints.push(Constraint::Unique);
        }
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&Constraint::PrimaryKey)
    }

    pub fn is_not_null(&self) -> bool {
        self.constraints.contains(&Constraint::NotNull)
    }

    pub fn is_unique(&self) -> bool {
        self.constraints.contains(&Constraint::Unique)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        for constraint in &self.constraints {
            write!(f, " {}", constraint)?;
        }
        Ok(())
    }
}
