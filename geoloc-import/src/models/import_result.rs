//! Import run results
//!
//! One [`ImportSummary`] per invocation, one [`CountryReport`] per
//! processed country, one [`LevelStats`] per hierarchy level.

use crate::models::LetterCase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity counts for one hierarchy level of one country
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Distinct natural keys found already in the store
    pub reused: usize,
    /// Entities created by this run
    pub created: usize,
    /// Stale entities removed by the purge pass
    pub deleted: usize,
}

impl LevelStats {
    /// Whether the level was left untouched
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.deleted == 0
    }
}

/// Outcome of reconciling one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryReport {
    pub code: String,
    pub name: String,
    /// Rows in the downloaded table
    pub rows_total: usize,
    /// Rows inside the `max_import` cap
    pub rows_considered: usize,
    /// Whether the purge pass ran (full runs only)
    pub purged: bool,
    pub states: LevelStats,
    pub boroughs: LevelStats,
    pub cities: LevelStats,
    pub zips: LevelStats,
}

impl CountryReport {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            rows_total: 0,
            rows_considered: 0,
            purged: false,
            states: LevelStats::default(),
            boroughs: LevelStats::default(),
            cities: LevelStats::default(),
            zips: LevelStats::default(),
        }
    }

    /// Total entities created across every level
    pub fn total_created(&self) -> usize {
        self.states.created + self.boroughs.created + self.cities.created + self.zips.created
    }

    /// Total entities deleted across every level
    pub fn total_deleted(&self) -> usize {
        self.states.deleted + self.boroughs.deleted + self.cities.deleted + self.zips.deleted
    }
}

/// Import completion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Identifier attached to every log line of the run
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub letter_case: LetterCase,
    /// Row cap, `0` for a full run
    pub max_import: usize,
    /// Reports in processing order
    pub countries: Vec<CountryReport>,
}
