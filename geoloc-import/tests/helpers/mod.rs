//! Test Helper Utilities
//!
//! Shared utilities for testing geoloc-import

#![allow(dead_code)]

use async_trait::async_trait;
use geoloc_common::db::countries::{insert_country, set_column_overrides, ColumnOverrides};
use geoloc_common::db::init::create_schema;
use geoloc_common::db::models::Country;
use geoloc_common::{Error, Result};
use geoloc_import::services::feed::{parse_rows, RecordSource, Row};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;

/// Single-connection in-memory database with the geography schema
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();
    pool
}

/// Register a country and return its id
pub async fn add_country(pool: &SqlitePool, code: &str, name: &str) -> i64 {
    insert_country(pool, code, name).await.unwrap()
}

pub async fn add_country_with_columns(
    pool: &SqlitePool,
    code: &str,
    name: &str,
    overrides: ColumnOverrides,
) -> i64 {
    let id = add_country(pool, code, name).await;
    set_column_overrides(pool, id, overrides).await.unwrap();
    id
}

/// One geonames line with the default column layout
///
/// `country, zip, city, state name, state code, borough name, borough code`
pub fn geonames_line(
    country: &str,
    zip: &str,
    city: &str,
    state: (&str, &str),
    borough: (&str, &str),
) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t\t\t48.85\t2.35\t6",
        country, zip, city, state.0, state.1, borough.0, borough.1
    )
}

/// Rows parsed from whole lines
pub fn rows(lines: &[String]) -> Vec<Row> {
    parse_rows(&lines.join("\n"))
}

/// Record source serving fixed feeds by country code
#[derive(Default)]
pub struct StaticSource {
    feeds: HashMap<String, Vec<Row>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, code: &str, lines: &[String]) -> Self {
        self.feeds.insert(code.to_string(), rows(lines));
        self
    }

    /// Country codes fetched so far, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch(&self, country: &Country) -> Result<Vec<Row>> {
        self.fetched.lock().unwrap().push(country.code.clone());
        self.feeds.get(&country.code).cloned().ok_or(Error::Fetch {
            status: 404,
            url: format!("static://{}.zip", country.code),
        })
    }
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn city_names(pool: &SqlitePool, country_id: i64) -> Vec<String> {
    geoloc_common::db::geography::list_cities(pool, country_id)
        .await
        .unwrap()
        .into_iter()
        .map(|city| city.name)
        .collect()
}

pub async fn zip_codes(pool: &SqlitePool, country_id: i64) -> Vec<String> {
    let mut codes: Vec<String> = geoloc_common::db::geography::list_zips(pool, country_id)
        .await
        .unwrap()
        .into_iter()
        .map(|zip| zip.name)
        .collect();
    codes.sort();
    codes
}
