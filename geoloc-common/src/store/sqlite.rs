//! SQLite-backed record store
//!
//! Every operation runs inside the one transaction the store was opened
//! with; nothing is visible to other connections until [`SqliteGeoStore::commit`].

use super::{EntityKind, Field, FieldMap, FieldValue, GeoStore};
use crate::db::models::Country;
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

/// Ids per DELETE statement, kept well below SQLite's bind limit
const DELETE_CHUNK_SIZE: usize = 500;

/// Parameter bound to one `?` placeholder
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Id(i64),
}

/// Record store over a single SQLite transaction
pub struct SqliteGeoStore {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteGeoStore {
    /// Open a transaction on the pool
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let tx = pool.begin().await?;
        Ok(Self { tx })
    }

    /// Make every change made through this store durable
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard every change made through this store
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Build `WHERE` text and its binds for a filter
fn where_clause(kind: EntityKind, filter: &FieldMap) -> Result<(String, Vec<Bind>)> {
    let mut clauses = Vec::with_capacity(filter.len());
    let mut binds = Vec::with_capacity(filter.len());

    for (field, value) in filter.iter() {
        if !kind.supports(field) {
            return Err(Error::InvalidInput(format!(
                "{} records cannot be filtered by {}",
                kind,
                field.column()
            )));
        }

        // Zip entries reach their country through the owning city
        let column = if kind == EntityKind::Zip && field == Field::CountryId {
            "city_id IN (SELECT id FROM geo_city WHERE country_id = ?)".to_string()
        } else {
            format!("{} = ?", field.column())
        };

        match value {
            FieldValue::Text(text) => {
                clauses.push(column);
                binds.push(Bind::Text(text.clone()));
            }
            FieldValue::Id(id) => {
                clauses.push(column);
                binds.push(Bind::Id(*id));
            }
            FieldValue::Null => {
                if kind == EntityKind::Zip && field == Field::CountryId {
                    return Err(Error::InvalidInput(
                        "city zip country filter requires a country id".to_string(),
                    ));
                }
                clauses.push(format!("{} IS NULL", field.column()));
            }
        }
    }

    if clauses.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!(" WHERE {}", clauses.join(" AND ")), binds))
    }
}

#[async_trait]
impl GeoStore for SqliteGeoStore {
    async fn find_one(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<Option<i64>> {
        let (clause, binds) = where_clause(kind, filter)?;
        let sql = format!("SELECT id FROM {}{} ORDER BY id LIMIT 1", kind.table(), clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in binds {
            query = match bind {
                Bind::Text(text) => query.bind(text),
                Bind::Id(id) => query.bind(id),
            };
        }

        let id = query.fetch_optional(&mut *self.tx).await?;
        Ok(id)
    }

    async fn exists_any(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<bool> {
        let (clause, binds) = where_clause(kind, filter)?;
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {}{})", kind.table(), clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in binds {
            query = match bind {
                Bind::Text(text) => query.bind(text),
                Bind::Id(id) => query.bind(id),
            };
        }

        let exists = query.fetch_one(&mut *self.tx).await?;
        Ok(exists != 0)
    }

    async fn search_ids(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<Vec<i64>> {
        let (clause, binds) = where_clause(kind, filter)?;
        let sql = format!("SELECT id FROM {}{} ORDER BY id", kind.table(), clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in binds {
            query = match bind {
                Bind::Text(text) => query.bind(text),
                Bind::Id(id) => query.bind(id),
            };
        }

        let ids = query.fetch_all(&mut *self.tx).await?;
        Ok(ids)
    }

    async fn create_many(&mut self, kind: EntityKind, records: &[FieldMap]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            if record.is_empty() {
                return Err(Error::InvalidInput(format!("Empty {} record", kind)));
            }

            let mut columns = Vec::with_capacity(record.len());
            for (field, _) in record.iter() {
                if !kind.supports(field) || (kind == EntityKind::Zip && field == Field::CountryId) {
                    return Err(Error::InvalidInput(format!(
                        "{} records have no {} column",
                        kind,
                        field.column()
                    )));
                }
                columns.push(field.column());
            }

            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                kind.table(),
                columns.join(", "),
                placeholders
            );

            let mut query = sqlx::query(&sql);
            for (_, value) in record.iter() {
                query = match value {
                    FieldValue::Text(text) => query.bind(text.clone()),
                    FieldValue::Id(id) => query.bind(*id),
                    FieldValue::Null => query.bind(None::<i64>),
                };
            }

            let result = query.execute(&mut *self.tx).await?;
            ids.push(result.last_insert_rowid());
        }

        if !ids.is_empty() {
            debug!(kind = %kind, count = ids.len(), "Created records");
        }

        Ok(ids)
    }

    async fn delete_many(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()> {
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM {} WHERE id IN ({})", kind.table(), placeholders);

            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(*id);
            }

            query.execute(&mut *self.tx).await?;
        }

        if !ids.is_empty() {
            debug!(kind = %kind, count = ids.len(), "Deleted records");
        }

        Ok(())
    }

    async fn load_country(&mut self, id: i64) -> Result<Option<Country>> {
        crate::db::countries::load_country(&mut *self.tx, id).await
    }
}
