//! Country database operations
//!
//! Countries are the fixed roots of the hierarchy. They are registered
//! here, carry the per-country feed column overrides, and are only read
//! by the importer.

use crate::db::models::Country;
use crate::{Error, Result};
use sqlx::{Executor, Sqlite, SqlitePool};

/// Per-country column overrides to apply
///
/// A `None` field leaves the stored value untouched; `Some(0)` clears it
/// back to the default layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnOverrides {
    pub state_name: Option<i64>,
    pub state_code: Option<i64>,
    pub borough_name: Option<i64>,
    pub borough_code: Option<i64>,
}

/// Register a new country and return its id
pub async fn insert_country(pool: &SqlitePool, code: &str, name: &str) -> Result<i64> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::InvalidInput("Country code must not be empty".to_string()));
    }

    let result = sqlx::query("INSERT INTO geo_country (code, name) VALUES (?, ?)")
        .bind(code.to_uppercase())
        .bind(name.trim())
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Load country by id
pub async fn load_country<'e, E>(executor: E, id: i64) -> Result<Option<Country>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let country = sqlx::query_as::<_, Country>(
        r#"
        SELECT id, code, name, state_name_column, state_code_column,
               borough_name_column, borough_code_column
        FROM geo_country
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(country)
}

/// Load country by its (case-insensitive) code
pub async fn find_country_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Country>> {
    let country = sqlx::query_as::<_, Country>(
        r#"
        SELECT id, code, name, state_name_column, state_code_column,
               borough_name_column, borough_code_column
        FROM geo_country
        WHERE code = ?
        "#,
    )
    .bind(code.trim().to_uppercase())
    .fetch_optional(pool)
    .await?;

    Ok(country)
}

/// Apply column overrides to a country
pub async fn set_column_overrides(
    pool: &SqlitePool,
    country_id: i64,
    overrides: ColumnOverrides,
) -> Result<()> {
    let updates = [
        ("state_name_column", overrides.state_name),
        ("state_code_column", overrides.state_code),
        ("borough_name_column", overrides.borough_name),
        ("borough_code_column", overrides.borough_code),
    ];

    for (column, value) in updates {
        let Some(value) = value else { continue };
        if value < 0 {
            return Err(Error::InvalidInput(format!(
                "{} must not be negative (got {})",
                column, value
            )));
        }

        let stored = if value == 0 { None } else { Some(value) };
        // Column names come from the fixed list above, never from input
        let sql = format!("UPDATE geo_country SET {} = ? WHERE id = ?", column);
        let result = sqlx::query(&sql)
            .bind(stored)
            .bind(country_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Country id {}", country_id)));
        }
    }

    Ok(())
}
