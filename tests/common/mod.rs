#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use filterbase::domain::entity::{Column, DataType, Table};
use filterbase::infrastructure::{MemoryEngine, MemoryStorage};
use filterbase::{BaseRepository, Entity, Repository, Row};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub priority: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Product {
    const TABLE: &'static str = "products";
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Post {
    const TABLE: &'static str = "posts";
    const SOFT_DELETES: bool = true;
}

pub fn engine() -> MemoryEngine {
    let engine = MemoryEngine::new(Arc::new(MemoryStorage::new()));
    engine
        .create_table(
            Table::new("products")
                .with_column(Column::new("id", DataType::Integer).primary_key())
                .and_then(|t| t.with_column(Column::new("name", DataType::Text).not_null()))
                .and_then(|t| t.with_column(Column::new("category", DataType::Text)))
                .and_then(|t| t.with_column(Column::new("priority", DataType::Integer)))
                .and_then(|t| t.with_column(Column::new("is_active", DataType::Boolean)))
                .and_then(|t| t.with_column(Column::new("created_at", DataType::Timestamp)))
                .and_then(|t| t.with_column(Column::new("updated_at", DataType::Timestamp)))
                .unwrap(),
        )
        .unwrap();
    engine
        .create_table(
            Table::new("posts")
                .with_column(Column::new("id", DataType::Integer).primary_key())
                .and_then(|t| t.with_column(Column::new("title", DataType::Text).not_null()))
                .and_then(|t| t.with_column(Column::new("deleted_at", DataType::Timestamp)))
                .unwrap(),
        )
        .unwrap();
    engine
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// 5件の商品を作成する（id 1..=5）
pub async fn seeded_products(engine: MemoryEngine) -> BaseRepository<Product> {
    let repo = BaseRepository::<Product>::new(Arc::new(engine));
    let fixtures = [
        ("Apple Juice", "drink", 3, true, at(2024, 1, 1, 9)),
        ("Banana", "fruit", 7, true, at(2024, 1, 2, 0)),
        ("Cherry Cola", "drink", 1, false, at(2024, 1, 2, 23)),
        ("Date", "fruit", 5, true, at(2024, 1, 3, 12)),
        ("Elderflower", "drink", 2, true, at(2024, 1, 4, 8)),
    ];
    for (name, category, priority, active, created_at) in fixtures {
        let row = Row::new()
            .with("name", name)
            .with("category", category)
            .with("priority", priority)
            .with("is_active", active)
            .with("created_at", created_at);
        repo.create(row).await.unwrap();
    }
    repo
}

pub fn names(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.name.as_str()).collect()
}
