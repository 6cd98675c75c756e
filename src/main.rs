use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filterbase::domain::entity::{Column, DataType, Table};
use filterbase::infrastructure::{MemoryEngine, MemoryStorage};
use filterbase::{
    BaseRepository, Conditions, Entity, Error, ListOptions, PaginationOptions, Repository, RepositoryConfig, Row,
    SortDirection, VERSION,
};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Product {
    id: i64,
    name: String,
    priority: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl Entity for Product {
    const TABLE: &'static str = "products";
}

#[tokio::main]
async fn main() -> filterbase::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("filterbase version: {}", VERSION);

    // FILTERBASE_CONFIG にJSONがあれば設定を上書きする
    let config = match std::env::var("FILTERBASE_CONFIG") {
        Ok(json) => RepositoryConfig::from_json(&json)
            .map_err(|e| Error::Usage(format!("invalid FILTERBASE_CONFIG: {}", e)))?,
        Err(_) => RepositoryConfig::default(),
    };

    let engine = MemoryEngine::new(Arc::new(MemoryStorage::new()))
        .with_searchable_columns("products", ["name"]);
    engine.create_table(
        Table::new("products")
            .with_column(Column::new("id", DataType::Integer).primary_key())?
            .with_column(Column::new("name", DataType::Text).not_null())?
            .with_column(Column::new("priority", DataType::Integer))?
            .with_column(Column::new("is_active", DataType::Boolean))?
            .with_column(Column::new("created_at", DataType::Timestamp))?
            .with_column(Column::new("updated_at", DataType::Timestamp))?,
    )?;

    let repository = BaseRepository::<Product>::with_config(Arc::new(engine), config);

    for (name, active) in [("keyboard", true), ("mouse", true), ("monitor", false), ("mousepad", true)] {
        let priority = repository.next_priority().await?;
        let row = Row::new()
            .with("name", name)
            .with("is_active", active)
            .with("priority", priority);
        repository.create(row).await?;
    }

    let active = repository
        .list(&ListOptions::builder().active(true).keyword("mouse").build())
        .await?;
    info!(count = active.len(), "active products matching 'mouse'");

    let options = ListOptions::builder().order("priority").sort(SortDirection::Asc).build();
    let pagination = PaginationOptions::builder().per_page(2).build();
    if let Some(page) = repository
        .list_paginated(&options, &pagination, &Conditions::default())
        .await?
        .into_page()
    {
        info!(
            total = page.total,
            last_page = page.last_page(),
            first = ?page.items.first().map(|p| &p.name),
            "first page"
        );
    }

    Ok(())
}
