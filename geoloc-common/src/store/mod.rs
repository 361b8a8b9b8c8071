//! Record store interface
//!
//! The importer never issues SQL itself. It addresses entities through
//! [`GeoStore`], a small capability set (lookup, existence probe, id
//! snapshot, bulk create, bulk delete) keyed by [`EntityKind`] and
//! filtered by [`FieldMap`] predicates.

pub mod sqlite;

pub use sqlite::SqliteGeoStore;

use crate::db::models::Country;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// One level of the geography hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Country,
    State,
    Borough,
    City,
    Zip,
}

impl EntityKind {
    /// Backing table name
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Country => "geo_country",
            EntityKind::State => "geo_state",
            EntityKind::Borough => "geo_borough",
            EntityKind::City => "geo_city",
            EntityKind::Zip => "geo_city_zip",
        }
    }

    /// Human-readable label used in logs and errors
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Country => "country",
            EntityKind::State => "state",
            EntityKind::Borough => "borough",
            EntityKind::City => "city",
            EntityKind::Zip => "city zip",
        }
    }

    /// Whether records of this kind can be filtered by `field`
    ///
    /// Zip entries have no country column but accept a country filter,
    /// which stores resolve through the owning city.
    pub fn supports(self, field: Field) -> bool {
        use Field::*;
        match self {
            EntityKind::Country => matches!(field, Name | Code),
            EntityKind::State => matches!(field, Name | Code | CountryId),
            EntityKind::Borough => matches!(field, Name | Code | StateId | CountryId),
            EntityKind::City => matches!(field, Name | BoroughId | StateId | CountryId),
            EntityKind::Zip => matches!(field, Name | CityId | CountryId),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Column addressed by a lookup or creation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Code,
    CountryId,
    StateId,
    BoroughId,
    CityId,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Code => "code",
            Field::CountryId => "country_id",
            Field::StateId => "state_id",
            Field::BoroughId => "borough_id",
            Field::CityId => "city_id",
        }
    }
}

/// Value stored in or matched against a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    Id(i64),
    Null,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Id(value)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Id)
    }
}

/// Field/value pairs with structural equality
///
/// Serves both as a creation record and as an AND-of-equalities filter.
/// Two maps holding the same pairs compare and hash equal regardless of
/// the order they were built in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldMap(BTreeMap<Field, FieldValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.0.insert(field, value.into());
        self
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.0.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.0.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Capability set the importer requires from a persistent store
///
/// Implementations must fail loudly: a constraint violation during
/// `delete_many` is an error, never a silent skip.
#[async_trait]
pub trait GeoStore: Send {
    /// First entity of `kind` matching every pair in `filter`
    async fn find_one(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<Option<i64>>;

    /// Whether any entity of `kind` matches `filter`
    async fn exists_any(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<bool>;

    /// Ids of every entity of `kind` matching `filter`, ascending
    async fn search_ids(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<Vec<i64>>;

    /// Insert records, returning their ids in input order
    async fn create_many(&mut self, kind: EntityKind, records: &[FieldMap]) -> Result<Vec<i64>>;

    /// Delete entities by id
    async fn delete_many(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()>;

    /// Load a country with its column overrides
    async fn load_country(&mut self, id: i64) -> Result<Option<Country>>;
}
