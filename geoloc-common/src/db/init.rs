//! Database initialization
//!
//! Opens (or creates) the SQLite file and creates the geography tables.
//! Every statement is `IF NOT EXISTS`, so initialization is idempotent and
//! runs on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Foreign keys are a per-connection pragma, so they go on the connect
    // options rather than a one-off PRAGMA statement
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by geoloc
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_countries_table(pool).await?;
    create_states_table(pool).await?;
    create_boroughs_table(pool).await?;
    create_cities_table(pool).await?;
    create_city_zips_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the countries table
///
/// The four `*_column` overrides are NULL when the feed uses the
/// default layout.
async fn create_countries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geo_country (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            state_name_column INTEGER,
            state_code_column INTEGER,
            borough_name_column INTEGER,
            borough_code_column INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_states_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geo_state (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            country_id INTEGER NOT NULL REFERENCES geo_country(id) ON DELETE RESTRICT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_geo_state_country ON geo_state(country_id, code)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_boroughs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geo_borough (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            state_id INTEGER NOT NULL REFERENCES geo_state(id) ON DELETE RESTRICT,
            country_id INTEGER NOT NULL REFERENCES geo_country(id) ON DELETE RESTRICT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_geo_borough_lookup ON geo_borough(name, code, state_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_geo_borough_country ON geo_borough(country_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the cities table
///
/// A city is unique by name within its borough, state and country.
async fn create_cities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geo_city (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            borough_id INTEGER REFERENCES geo_borough(id) ON DELETE RESTRICT,
            state_id INTEGER NOT NULL REFERENCES geo_state(id) ON DELETE RESTRICT,
            country_id INTEGER NOT NULL REFERENCES geo_country(id) ON DELETE RESTRICT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // NULLs are distinct in a plain UNIQUE constraint; ids start at 1
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_geo_city_natural_key
        ON geo_city(name, IFNULL(borough_id, 0), state_id, country_id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_geo_city_country ON geo_city(country_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_city_zips_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geo_city_zip (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            city_id INTEGER NOT NULL REFERENCES geo_city(id) ON DELETE RESTRICT,
            UNIQUE(name, city_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_geo_city_zip_city ON geo_city_zip(city_id)")
        .execute(pool)
        .await?;

    Ok(())
}
