//! Import orchestrator
//!
//! Drives countries one after another: fetch the feed, reconcile it. The
//! first failure aborts the whole run and is returned unchanged.
//!
//! Callers must serialize runs touching the same country; two concurrent
//! imports of one country race on the store.

use crate::models::{CountryReport, ImportSummary, LetterCase};
use crate::services::feed::RecordSource;
use crate::services::reconciler::{reconcile, ReconcileOptions};
use chrono::Utc;
use geoloc_common::{Error, GeoStore, Result, SqliteGeoStore};
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// One import invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRequest {
    /// Countries in processing order; duplicates are processed once
    pub country_ids: Vec<i64>,
    pub letter_case: LetterCase,
    /// Row cap, `0` for a full purge-enabled run
    pub max_import: usize,
}

impl ImportRequest {
    pub fn new(country_ids: Vec<i64>) -> Self {
        Self {
            country_ids,
            ..Default::default()
        }
    }

    pub fn with_letter_case(mut self, letter_case: LetterCase) -> Self {
        self.letter_case = letter_case;
        self
    }

    pub fn with_max_import(mut self, max_import: usize) -> Self {
        self.max_import = max_import;
        self
    }
}

/// Import every requested country through an open store
pub async fn run<S, R>(store: &mut S, source: &R, request: &ImportRequest) -> Result<ImportSummary>
where
    S: GeoStore + ?Sized,
    R: RecordSource + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("import", run_id = %run_id);
    run_inner(store, source, request, run_id).instrument(span).await
}

async fn run_inner<S, R>(
    store: &mut S,
    source: &R,
    request: &ImportRequest,
    run_id: Uuid,
) -> Result<ImportSummary>
where
    S: GeoStore + ?Sized,
    R: RecordSource + ?Sized,
{
    let started_at = Utc::now();
    let clock = Instant::now();
    let options = ReconcileOptions {
        letter_case: request.letter_case,
        max_import: request.max_import,
    };

    let mut country_ids = Vec::with_capacity(request.country_ids.len());
    for id in &request.country_ids {
        if !country_ids.contains(id) {
            country_ids.push(*id);
        }
    }

    info!(
        countries = country_ids.len(),
        letter_case = %request.letter_case,
        max_import = request.max_import,
        "Starting geonames import"
    );

    let mut countries: Vec<CountryReport> = Vec::with_capacity(country_ids.len());
    for country_id in country_ids {
        let country = store
            .load_country(country_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Country id {}", country_id)))?;

        let rows = source.fetch(&country).await?;
        let report = reconcile(store, &country, &rows, options).await?;
        countries.push(report);
    }

    let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(duration_ms, "Geonames import complete");

    Ok(ImportSummary {
        run_id,
        started_at,
        duration_ms,
        letter_case: request.letter_case,
        max_import: request.max_import,
        countries,
    })
}

/// Run an import inside one SQLite transaction
///
/// Commits when every country succeeded, rolls back otherwise.
pub async fn run_import<R>(
    pool: &SqlitePool,
    source: &R,
    request: &ImportRequest,
) -> Result<ImportSummary>
where
    R: RecordSource + ?Sized,
{
    let mut store = SqliteGeoStore::begin(pool).await?;

    match run(&mut store, source, request).await {
        Ok(summary) => {
            store.commit().await?;
            Ok(summary)
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback().await {
                warn!("Rollback after failed import also failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ImportRequest::new(vec![3, 1])
            .with_letter_case(LetterCase::Upper)
            .with_max_import(25);

        assert_eq!(request.country_ids, vec![3, 1]);
        assert_eq!(request.letter_case, LetterCase::Upper);
        assert_eq!(request.max_import, 25);
        assert_eq!(ImportRequest::new(vec![]).max_import, 0);
    }
}
