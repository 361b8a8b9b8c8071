//! Hierarchical reconciler
//!
//! Converges the store to one country's feed in four passes (states,
//! boroughs, cities, zips) followed, on full runs only, by a purge of
//! stale zips, cities and boroughs. Each pass hands a natural key to id
//! mapping to the next one, so every child record references a parent
//! resolved earlier in the same run.
//!
//! Per pass:
//! 1. One existence probe decides whether point lookups are worth doing.
//! 2. Every considered row yields a natural key; known keys are reused,
//!    unknown ones are staged (first record per key wins).
//! 3. Staged records are bulk-created and their ids merged into the
//!    mapping.

pub mod staging;

pub use staging::Staging;

use crate::models::{normalize, ColumnLayout, CountryReport, LetterCase, LevelStats};
use crate::services::feed::Row;
use geoloc_common::db::models::Country;
use geoloc_common::{EntityKind, Error, Field, FieldMap, GeoStore, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use tracing::{debug, info};

/// Run-wide reconciler settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub letter_case: LetterCase,
    /// Only the first `max_import` rows are considered; `0` means all
    /// rows and enables the purge pass
    pub max_import: usize,
}

impl ReconcileOptions {
    pub fn is_full_run(&self) -> bool {
        self.max_import == 0
    }
}

/// Borough natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoroughKey {
    pub name: String,
    pub code: String,
    pub state_id: i64,
}

impl fmt::Display for BoroughKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) in state {}", self.name, self.code, self.state_id)
    }
}

/// City natural key, the country being implied by the run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityKey {
    pub name: String,
    pub borough_id: Option<i64>,
    pub state_id: i64,
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.borough_id {
            Some(borough_id) => write!(
                f,
                "{} in borough {} of state {}",
                self.name, borough_id, self.state_id
            ),
            None => write!(f, "{} in state {}", self.name, self.state_id),
        }
    }
}

/// Zip natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZipKey {
    pub code: String,
    pub city_id: i64,
}

/// What one row contributes to a pass
struct Candidate<K> {
    key: K,
    /// Natural-key lookup predicate
    filter: FieldMap,
    /// Record to create when the lookup finds nothing
    record: FieldMap,
}

/// Entities of the country present before the run started
#[derive(Debug, Default)]
struct Snapshot {
    zips: Vec<i64>,
    cities: Vec<i64>,
    boroughs: Vec<i64>,
}

/// Reconcile one country's rows against the store
pub async fn reconcile<S>(
    store: &mut S,
    country: &Country,
    rows: &[Row],
    options: ReconcileOptions,
) -> Result<CountryReport>
where
    S: GeoStore + ?Sized,
{
    let layout = ColumnLayout::from_country(country)?;
    let considered = if options.is_full_run() {
        rows
    } else {
        &rows[..rows.len().min(options.max_import)]
    };
    layout.validate(considered)?;

    let mut report = CountryReport::new(&country.code, &country.name);
    report.rows_total = rows.len();
    report.rows_considered = considered.len();

    let by_country = FieldMap::new().with(Field::CountryId, country.id);
    let snapshot = if options.is_full_run() {
        Some(Snapshot {
            zips: store.search_ids(EntityKind::Zip, &by_country).await?,
            cities: store.search_ids(EntityKind::City, &by_country).await?,
            boroughs: store.search_ids(EntityKind::Borough, &by_country).await?,
        })
    } else {
        None
    };

    info!(
        country = %country.code,
        rows = considered.len(),
        "Starting to create the boroughs, cities and/or city zip entries"
    );

    let reader = RowReader {
        layout,
        letter_case: options.letter_case,
    };

    let (states, stats) = run_pass(store, EntityKind::State, country.id, considered, |row| {
        let code = reader.state_code(row)?;
        Ok(Some(Candidate {
            key: code.to_string(),
            filter: FieldMap::new()
                .with(Field::CountryId, country.id)
                .with(Field::Code, code),
            record: FieldMap::new()
                .with(Field::Name, reader.state_name(row)?)
                .with(Field::Code, code)
                .with(Field::CountryId, country.id),
        }))
    })
    .await?;
    report.states = stats;

    let (boroughs, stats) = run_pass(store, EntityKind::Borough, country.id, considered, |row| {
        let state_id = reader.resolve_state(row, &states)?;
        let Some(key) = reader.borough_key(row, state_id)? else {
            return Ok(None);
        };
        Ok(Some(Candidate {
            filter: FieldMap::new()
                .with(Field::Name, key.name.as_str())
                .with(Field::Code, key.code.as_str())
                .with(Field::StateId, state_id),
            record: FieldMap::new()
                .with(Field::Name, key.name.as_str())
                .with(Field::Code, key.code.as_str())
                .with(Field::StateId, state_id)
                .with(Field::CountryId, country.id),
            key,
        }))
    })
    .await?;
    report.boroughs = stats;

    let (cities, stats) = run_pass(store, EntityKind::City, country.id, considered, |row| {
        let key = reader.city_key(row, &states, &boroughs)?;
        let fields = FieldMap::new()
            .with(Field::Name, key.name.as_str())
            .with(Field::BoroughId, key.borough_id)
            .with(Field::StateId, key.state_id)
            .with(Field::CountryId, country.id);
        Ok(Some(Candidate {
            key,
            filter: fields.clone(),
            record: fields,
        }))
    })
    .await?;
    report.cities = stats;

    let (zips, stats) = run_pass(store, EntityKind::Zip, country.id, considered, |row| {
        let city_key = reader.city_key(row, &states, &boroughs)?;
        let city_id = *cities
            .get(&city_key)
            .ok_or_else(|| unresolved("city", &city_key))?;
        let code = reader.zip_code(row)?;
        let fields = FieldMap::new()
            .with(Field::Name, code)
            .with(Field::CityId, city_id);
        Ok(Some(Candidate {
            key: ZipKey {
                code: code.to_string(),
                city_id,
            },
            filter: fields.clone(),
            record: fields,
        }))
    })
    .await?;
    report.zips = stats;

    if let Some(snapshot) = snapshot {
        purge(store, country, snapshot, &zips, &cities, &boroughs, &mut report).await?;
        report.purged = true;
    } else {
        debug!(
            country = %country.code,
            max_import = options.max_import,
            "Capped run, skipping purge"
        );
    }

    info!(
        country = %country.code,
        created = report.total_created(),
        deleted = report.total_deleted(),
        "The import of boroughs, cities and/or city zip entries has been successfully completed"
    );

    Ok(report)
}

/// Run one creation/reuse pass over the considered rows
async fn run_pass<S, K, F>(
    store: &mut S,
    kind: EntityKind,
    country_id: i64,
    rows: &[Row],
    mut candidate: F,
) -> Result<(HashMap<K, i64>, LevelStats)>
where
    S: GeoStore + ?Sized,
    K: Clone + Eq + Hash,
    F: FnMut(&Row) -> Result<Option<Candidate<K>>>,
{
    let search_enabled = store
        .exists_any(kind, &FieldMap::new().with(Field::CountryId, country_id))
        .await?;
    debug!(kind = %kind, search_enabled, "Starting pass");

    let mut mapping = HashMap::new();
    let mut staging = Staging::new(kind);
    let mut stats = LevelStats::default();

    for row in rows {
        let Some(candidate) = candidate(row)? else {
            continue;
        };
        if mapping.contains_key(&candidate.key) || staging.contains(&candidate.key) {
            continue;
        }

        let existing = if search_enabled {
            store.find_one(kind, &candidate.filter).await?
        } else {
            None
        };

        match existing {
            Some(id) => {
                mapping.insert(candidate.key, id);
                stats.reused += 1;
            }
            None => {
                staging.stage(candidate.key, candidate.record);
            }
        }
    }

    debug!(kind = %kind, staged = staging.len(), "Creating staged entries");
    let created = staging.create_all(store).await?;
    stats.created = created.len();
    mapping.extend(created);

    debug!(
        kind = %kind,
        reused = stats.reused,
        created = stats.created,
        "Pass complete"
    );

    Ok((mapping, stats))
}

/// Delete pre-existing entities no longer reachable from the feed
///
/// Children go first so no delete hits a restricting reference. States
/// are never purged.
async fn purge<S>(
    store: &mut S,
    country: &Country,
    snapshot: Snapshot,
    zips: &HashMap<ZipKey, i64>,
    cities: &HashMap<CityKey, i64>,
    boroughs: &HashMap<BoroughKey, i64>,
    report: &mut CountryReport,
) -> Result<()>
where
    S: GeoStore + ?Sized,
{
    report.zips.deleted = delete_stale(store, country, EntityKind::Zip, snapshot.zips, zips).await?;
    report.cities.deleted =
        delete_stale(store, country, EntityKind::City, snapshot.cities, cities).await?;
    report.boroughs.deleted =
        delete_stale(store, country, EntityKind::Borough, snapshot.boroughs, boroughs).await?;
    Ok(())
}

async fn delete_stale<S, K>(
    store: &mut S,
    country: &Country,
    kind: EntityKind,
    before: Vec<i64>,
    kept: &HashMap<K, i64>,
) -> Result<usize>
where
    S: GeoStore + ?Sized,
{
    let kept: HashSet<i64> = kept.values().copied().collect();
    let stale: Vec<i64> = before.into_iter().filter(|id| !kept.contains(id)).collect();
    if stale.is_empty() {
        return Ok(0);
    }

    info!(country = %country.code, "Removing {} entries", kind);
    store.delete_many(kind, &stale).await?;
    info!(
        country = %country.code,
        count = stale.len(),
        "{} {} entries deleted for country {}",
        stale.len(),
        kind,
        country.name
    );

    Ok(stale.len())
}

fn unresolved(level: &'static str, key: &impl fmt::Display) -> Error {
    Error::UnresolvedReference {
        level,
        key: key.to_string(),
    }
}

/// Reads keys out of rows through the country's layout
struct RowReader {
    layout: ColumnLayout,
    letter_case: LetterCase,
}

impl RowReader {
    fn zip_code<'r>(&self, row: &'r Row) -> Result<&'r str> {
        row.field(self.layout.zip)
    }

    fn state_code<'r>(&self, row: &'r Row) -> Result<&'r str> {
        row.field(self.layout.state_code)
    }

    fn state_name(&self, row: &Row) -> Result<String> {
        Ok(normalize(row.field(self.layout.state_name)?, self.letter_case))
    }

    fn resolve_state(&self, row: &Row, states: &HashMap<String, i64>) -> Result<i64> {
        let code = self.state_code(row)?;
        states
            .get(code)
            .copied()
            .ok_or_else(|| unresolved("state", &code))
    }

    /// `None` when the row carries no borough
    fn borough_key(&self, row: &Row, state_id: i64) -> Result<Option<BoroughKey>> {
        let name = row.field(self.layout.borough_name)?;
        let code = row.field(self.layout.borough_code)?;
        if name.is_empty() || code.is_empty() {
            return Ok(None);
        }

        Ok(Some(BoroughKey {
            name: normalize(name, self.letter_case),
            code: code.to_string(),
            state_id,
        }))
    }

    fn city_key(
        &self,
        row: &Row,
        states: &HashMap<String, i64>,
        boroughs: &HashMap<BoroughKey, i64>,
    ) -> Result<CityKey> {
        let state_id = self.resolve_state(row, states)?;
        let borough_id = match self.borough_key(row, state_id)? {
            Some(key) => Some(
                *boroughs
                    .get(&key)
                    .ok_or_else(|| unresolved("borough", &key))?,
            ),
            None => None,
        };

        Ok(CityKey {
            name: normalize(row.field(self.layout.city)?, self.letter_case),
            borough_id,
            state_id,
        })
    }
}
