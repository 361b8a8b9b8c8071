//! Read-side queries over the imported hierarchy

use crate::db::models::{Borough, City, LevelCounts, State, ZipEntry};
use crate::Result;
use sqlx::SqlitePool;

/// Count stored entities per level for a country
pub async fn level_counts(pool: &SqlitePool, country_id: i64) -> Result<LevelCounts> {
    let (states, boroughs, cities, zips): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM geo_state WHERE country_id = ?1),
            (SELECT COUNT(*) FROM geo_borough WHERE country_id = ?1),
            (SELECT COUNT(*) FROM geo_city WHERE country_id = ?1),
            (SELECT COUNT(*) FROM geo_city_zip z
               JOIN geo_city c ON c.id = z.city_id
              WHERE c.country_id = ?1)
        "#,
    )
    .bind(country_id)
    .fetch_one(pool)
    .await?;

    Ok(LevelCounts {
        states,
        boroughs,
        cities,
        zips,
    })
}

pub async fn list_states(pool: &SqlitePool, country_id: i64) -> Result<Vec<State>> {
    let states = sqlx::query_as::<_, State>(
        "SELECT id, name, code, country_id FROM geo_state WHERE country_id = ? ORDER BY code",
    )
    .bind(country_id)
    .fetch_all(pool)
    .await?;

    Ok(states)
}

/// Boroughs ordered by code, then name
pub async fn list_boroughs(pool: &SqlitePool, country_id: i64) -> Result<Vec<Borough>> {
    let boroughs = sqlx::query_as::<_, Borough>(
        r#"
        SELECT id, name, code, state_id, country_id
        FROM geo_borough
        WHERE country_id = ?
        ORDER BY code, name
        "#,
    )
    .bind(country_id)
    .fetch_all(pool)
    .await?;

    Ok(boroughs)
}

pub async fn list_cities(pool: &SqlitePool, country_id: i64) -> Result<Vec<City>> {
    let cities = sqlx::query_as::<_, City>(
        r#"
        SELECT id, name, borough_id, state_id, country_id
        FROM geo_city
        WHERE country_id = ?
        ORDER BY name, id
        "#,
    )
    .bind(country_id)
    .fetch_all(pool)
    .await?;

    Ok(cities)
}

/// Zip entries of a country, resolved through their city
pub async fn list_zips(pool: &SqlitePool, country_id: i64) -> Result<Vec<ZipEntry>> {
    let zips = sqlx::query_as::<_, ZipEntry>(
        r#"
        SELECT z.id, z.name, z.city_id
        FROM geo_city_zip z
        JOIN geo_city c ON c.id = z.city_id
        WHERE c.country_id = ?
        ORDER BY z.name, z.id
        "#,
    )
    .bind(country_id)
    .fetch_all(pool)
    .await?;

    Ok(zips)
}
