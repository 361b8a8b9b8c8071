//! Settings database operations
//!
//! Get/set accessors for the `settings` key-value table.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Settings key holding the archive URL template
pub const GEONAMES_URL_KEY: &str = "geonames_url";

/// Get the archive URL template stored in the database
///
/// **Returns:** Some(template) if set, None otherwise
pub async fn get_geonames_url(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GEONAMES_URL_KEY).await
}

/// Store the archive URL template in the database
pub async fn set_geonames_url(db: &Pool<Sqlite>, url: String) -> Result<()> {
    set_setting(db, GEONAMES_URL_KEY, url).await
}

/// Generic setting getter
///
/// A NULL value reads as unset.
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
