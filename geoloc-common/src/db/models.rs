//! Database models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Country reference row
///
/// Countries are registered ahead of any import and never modified by it.
/// The column overrides describe where the feed keeps state and borough
/// data for this country; `None` (or `0`) means the default position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Country {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub state_name_column: Option<i64>,
    pub state_code_column: Option<i64>,
    pub borough_name_column: Option<i64>,
    pub borough_code_column: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct State {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub country_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Borough {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub state_id: i64,
    pub country_id: i64,
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub borough_id: Option<i64>,
    pub state_id: i64,
    pub country_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZipEntry {
    pub id: i64,
    pub name: String,
    pub city_id: i64,
}

/// Number of stored entities per level for one country
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub states: i64,
    pub boroughs: i64,
    pub cities: i64,
    pub zips: i64,
}
