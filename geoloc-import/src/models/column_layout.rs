//! Per-country feed column layout

use crate::services::feed::Row;
use geoloc_common::db::models::Country;
use geoloc_common::{Error, Result};
use serde::Serialize;

pub const ZIP_COLUMN: usize = 1;
pub const CITY_COLUMN: usize = 2;
pub const DEFAULT_STATE_NAME_COLUMN: usize = 3;
pub const DEFAULT_STATE_CODE_COLUMN: usize = 4;
pub const DEFAULT_BOROUGH_NAME_COLUMN: usize = 5;
pub const DEFAULT_BOROUGH_CODE_COLUMN: usize = 6;

/// Zero-based positions of every field the reconciler reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub zip: usize,
    pub city: usize,
    pub state_name: usize,
    pub state_code: usize,
    pub borough_name: usize,
    pub borough_code: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            zip: ZIP_COLUMN,
            city: CITY_COLUMN,
            state_name: DEFAULT_STATE_NAME_COLUMN,
            state_code: DEFAULT_STATE_CODE_COLUMN,
            borough_name: DEFAULT_BOROUGH_NAME_COLUMN,
            borough_code: DEFAULT_BOROUGH_CODE_COLUMN,
        }
    }
}

impl ColumnLayout {
    /// Build the layout from a country's stored overrides
    ///
    /// `None` and `0` select the default position.
    pub fn from_country(country: &Country) -> Result<Self> {
        Ok(Self {
            state_name: column_or_default(
                "state_name_column",
                country.state_name_column,
                DEFAULT_STATE_NAME_COLUMN,
            )?,
            state_code: column_or_default(
                "state_code_column",
                country.state_code_column,
                DEFAULT_STATE_CODE_COLUMN,
            )?,
            borough_name: column_or_default(
                "borough_name_column",
                country.borough_name_column,
                DEFAULT_BOROUGH_NAME_COLUMN,
            )?,
            borough_code: column_or_default(
                "borough_code_column",
                country.borough_code_column,
                DEFAULT_BOROUGH_CODE_COLUMN,
            )?,
            ..Self::default()
        })
    }

    /// Highest column index read from any row
    pub fn max_index(&self) -> usize {
        [
            self.zip,
            self.city,
            self.state_name,
            self.state_code,
            self.borough_name,
            self.borough_code,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Check every row is wide enough for this layout
    pub fn validate(&self, rows: &[Row]) -> Result<()> {
        let expected = self.max_index() + 1;
        match rows.iter().find(|row| row.len() < expected) {
            Some(row) => Err(Error::MalformedRow {
                line: row.line,
                expected,
                found: row.len(),
            }),
            None => Ok(()),
        }
    }
}

fn column_or_default(column: &str, value: Option<i64>, default: usize) -> Result<usize> {
    match value {
        None | Some(0) => Ok(default),
        Some(index) if index < 0 => Err(Error::Config(format!(
            "{} must not be negative (got {})",
            column, index
        ))),
        Some(index) => usize::try_from(index)
            .map_err(|_| Error::Config(format!("{} out of range (got {})", column, index))),
    }
}
