//! Reconciler integration tests against in-memory SQLite
//!
//! Each test registers a country, feeds rows through `reconcile` inside a
//! store transaction and checks both the returned report and the rows
//! left in the database.

mod helpers;

use async_trait::async_trait;
use geoloc_common::db::countries::ColumnOverrides;
use geoloc_common::db::models::Country;
use geoloc_common::{EntityKind, Error, Field, FieldMap, FieldValue, GeoStore, Result, SqliteGeoStore};
use geoloc_import::models::{CountryReport, LetterCase};
use geoloc_import::services::reconciler::{reconcile, ReconcileOptions};
use helpers::*;
use sqlx::SqlitePool;
use std::collections::HashSet;

const NO_BOROUGH: (&str, &str) = ("", "");

fn full(letter_case: LetterCase) -> ReconcileOptions {
    ReconcileOptions {
        letter_case,
        max_import: 0,
    }
}

fn capped(max_import: usize) -> ReconcileOptions {
    ReconcileOptions {
        letter_case: LetterCase::Unchanged,
        max_import,
    }
}

async fn try_import(
    pool: &SqlitePool,
    country_id: i64,
    lines: &[String],
    options: ReconcileOptions,
) -> Result<CountryReport> {
    let mut store = SqliteGeoStore::begin(pool).await?;
    let country = store.load_country(country_id).await?.expect("Country not found");

    match reconcile(&mut store, &country, &rows(lines), options).await {
        Ok(report) => {
            store.commit().await?;
            Ok(report)
        }
        Err(e) => {
            store.rollback().await?;
            Err(e)
        }
    }
}

async fn import(
    pool: &SqlitePool,
    country_id: i64,
    lines: &[String],
    options: ReconcileOptions,
) -> CountryReport {
    try_import(pool, country_id, lines, options).await.unwrap()
}

fn springfield_feed() -> Vec<String> {
    vec![
        geonames_line("US", "62701", "Springfield", ("California", "CA"), NO_BOROUGH),
        geonames_line("US", "93001", "Shelbyville", ("California", "CA"), NO_BOROUGH),
    ]
}

#[tokio::test]
async fn test_two_cities_one_state_scenario() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;

    let report = import(&pool, us, &springfield_feed(), full(LetterCase::Unchanged)).await;

    assert_eq!(report.states.created, 1);
    assert_eq!(report.boroughs.created, 0);
    assert_eq!(report.cities.created, 2);
    assert_eq!(report.zips.created, 2);
    assert_eq!(report.rows_total, 2);
    assert!(report.purged);

    assert_eq!(count(&pool, "geo_state").await, 1);
    assert_eq!(count(&pool, "geo_borough").await, 0);
    assert_eq!(city_names(&pool, us).await, vec!["Shelbyville", "Springfield"]);
    assert_eq!(zip_codes(&pool, us).await, vec!["62701", "93001"]);
}

#[tokio::test]
async fn test_upper_case_rerun_creates_new_city_keys() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    import(&pool, us, &springfield_feed(), full(LetterCase::Unchanged)).await;

    let report = import(&pool, us, &springfield_feed(), full(LetterCase::Upper)).await;

    // Normalization is part of the natural key, so nothing is reused
    assert_eq!(report.states.reused, 1);
    assert_eq!(report.states.created, 0);
    assert_eq!(report.cities.reused, 0);
    assert_eq!(report.cities.created, 2);
    assert_eq!(report.zips.created, 2);

    // Old-cased entities are no longer reachable and get purged
    assert_eq!(report.zips.deleted, 2);
    assert_eq!(report.cities.deleted, 2);
    assert_eq!(city_names(&pool, us).await, vec!["SHELBYVILLE", "SPRINGFIELD"]);
}

#[tokio::test]
async fn test_title_case_normalizes_names() {
    let pool = create_test_db().await;
    let fr = add_country(&pool, "FR", "France").await;
    let feed = vec![geonames_line(
        "FR",
        "42000",
        "SAINT-ÉTIENNE",
        ("AUVERGNE-RHÔNE-ALPES", "84"),
        ("LOIRE", "42"),
    )];

    import(&pool, fr, &feed, full(LetterCase::Title)).await;

    assert_eq!(city_names(&pool, fr).await, vec!["Saint-Étienne"]);
    let boroughs = geoloc_common::db::geography::list_boroughs(&pool, fr).await.unwrap();
    assert_eq!(boroughs[0].name, "Loire");
    assert_eq!(boroughs[0].code, "42");
    let states = geoloc_common::db::geography::list_states(&pool, fr).await.unwrap();
    assert_eq!(states[0].name, "Auvergne-Rhône-Alpes");
    assert_eq!(states[0].code, "84");
}

#[tokio::test]
async fn test_second_identical_run_changes_nothing() {
    let pool = create_test_db().await;
    let fr = add_country(&pool, "FR", "France").await;
    let feed = vec![
        geonames_line("FR", "75001", "Paris 01", ("Île-de-France", "11"), ("Paris", "75")),
        geonames_line("FR", "75002", "Paris 02", ("Île-de-France", "11"), ("Paris", "75")),
        geonames_line("FR", "69001", "Lyon", ("Auvergne-Rhône-Alpes", "84"), ("Rhône", "69")),
        geonames_line("FR", "69002", "Lyon", ("Auvergne-Rhône-Alpes", "84"), ("Rhône", "69")),
        geonames_line("FR", "97133", "Saint-Barthélemy", ("Guadeloupe", "01"), NO_BOROUGH),
    ];

    let first = import(&pool, fr, &feed, full(LetterCase::Unchanged)).await;
    assert_eq!(first.states.created, 3);
    assert_eq!(first.boroughs.created, 2);
    assert_eq!(first.cities.created, 4);
    assert_eq!(first.zips.created, 5);

    let second = import(&pool, fr, &feed, full(LetterCase::Unchanged)).await;

    assert_eq!(second.total_created(), 0);
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(second.states.reused, 3);
    assert_eq!(second.boroughs.reused, 2);
    assert_eq!(second.cities.reused, 4);
    assert_eq!(second.zips.reused, 5);
    assert_eq!(count(&pool, "geo_city_zip").await, 5);
}

#[tokio::test]
async fn test_duplicate_rows_create_one_entity() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let line = geonames_line("US", "62701", "Springfield", ("Illinois", "IL"), ("Sangamon", "167"));
    let feed = vec![line.clone(), line.clone(), line];

    let report = import(&pool, us, &feed, full(LetterCase::Unchanged)).await;

    assert_eq!(report.states.created, 1);
    assert_eq!(report.boroughs.created, 1);
    assert_eq!(report.cities.created, 1);
    assert_eq!(report.zips.created, 1);
    assert_eq!(count(&pool, "geo_city_zip").await, 1);
}

#[tokio::test]
async fn test_first_state_name_wins_for_shared_code() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let feed = vec![
        geonames_line("US", "62701", "Springfield", ("Illinois", "IL"), NO_BOROUGH),
        geonames_line("US", "60601", "Chicago", ("Ill.", "IL"), NO_BOROUGH),
    ];

    import(&pool, us, &feed, full(LetterCase::Unchanged)).await;

    let states = geoloc_common::db::geography::list_states(&pool, us).await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].name, "Illinois");
}

#[tokio::test]
async fn test_city_natural_key_includes_state_and_borough() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let feed = vec![
        geonames_line("US", "62701", "Springfield", ("Illinois", "IL"), NO_BOROUGH),
        geonames_line("US", "97477", "Springfield", ("Oregon", "OR"), NO_BOROUGH),
        geonames_line("US", "65801", "Springfield", ("Missouri", "MO"), ("Greene", "077")),
        geonames_line("US", "65802", "Springfield", ("Missouri", "MO"), NO_BOROUGH),
    ];

    let report = import(&pool, us, &feed, full(LetterCase::Unchanged)).await;

    assert_eq!(report.cities.created, 4);

    let cities = geoloc_common::db::geography::list_cities(&pool, us).await.unwrap();
    let keys: HashSet<(String, Option<i64>, i64)> = cities
        .iter()
        .map(|c| (c.name.clone(), c.borough_id, c.state_id))
        .collect();
    assert_eq!(keys.len(), cities.len(), "City natural keys must be unique");
}

#[tokio::test]
async fn test_rows_without_borough_attach_city_to_state_only() {
    let pool = create_test_db().await;
    let it = add_country(&pool, "IT", "Italy").await;
    let feed = vec![
        geonames_line("IT", "00118", "Roma", ("Lazio", "07"), ("Roma", "RM")),
        geonames_line("IT", "00010", "Tivoli", ("Lazio", "07"), ("", "RM")),
        geonames_line("IT", "00011", "Guidonia", ("Lazio", "07"), ("Roma", "")),
    ];

    let report = import(&pool, it, &feed, full(LetterCase::Unchanged)).await;

    assert_eq!(report.boroughs.created, 1);
    let cities = geoloc_common::db::geography::list_cities(&pool, it).await.unwrap();
    let without_borough: Vec<&str> = cities
        .iter()
        .filter(|c| c.borough_id.is_none())
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(without_borough, vec!["Guidonia", "Tivoli"]);
}

#[tokio::test]
async fn test_changed_zip_replaced_and_city_reused() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let before = vec![geonames_line("US", "00000", "Springfield", ("Illinois", "IL"), NO_BOROUGH)];
    import(&pool, us, &before, full(LetterCase::Unchanged)).await;
    let city_before = geoloc_common::db::geography::list_cities(&pool, us).await.unwrap();

    let after = vec![geonames_line("US", "00001", "Springfield", ("Illinois", "IL"), NO_BOROUGH)];
    let report = import(&pool, us, &after, full(LetterCase::Unchanged)).await;

    assert_eq!(report.cities.reused, 1);
    assert_eq!(report.cities.created, 0);
    assert_eq!(report.zips.created, 1);
    assert_eq!(report.zips.deleted, 1);
    assert_eq!(zip_codes(&pool, us).await, vec!["00001"]);

    let city_after = geoloc_common::db::geography::list_cities(&pool, us).await.unwrap();
    assert_eq!(city_before, city_after, "Springfield must not be recreated");
}

#[tokio::test]
async fn test_capped_run_never_deletes() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    import(&pool, us, &springfield_feed(), full(LetterCase::Unchanged)).await;

    let diverged = vec![
        geonames_line("US", "10001", "New York", ("New York", "NY"), NO_BOROUGH),
        geonames_line("US", "02101", "Boston", ("Massachusetts", "MA"), NO_BOROUGH),
    ];
    let report = import(&pool, us, &diverged, capped(1)).await;

    assert!(!report.purged);
    assert_eq!(report.rows_total, 2);
    assert_eq!(report.rows_considered, 1);
    assert_eq!(report.total_deleted(), 0);
    assert_eq!(report.states.created, 1);
    assert_eq!(
        city_names(&pool, us).await,
        vec!["New York", "Shelbyville", "Springfield"]
    );
    assert_eq!(zip_codes(&pool, us).await, vec!["10001", "62701", "93001"]);
}

#[tokio::test]
async fn test_full_run_purges_in_dependency_order_and_keeps_states() {
    let pool = create_test_db().await;
    let fr = add_country(&pool, "FR", "France").await;
    let before = vec![
        geonames_line("FR", "75001", "Paris 01", ("Île-de-France", "11"), ("Paris", "75")),
        geonames_line("FR", "69001", "Lyon", ("Auvergne-Rhône-Alpes", "84"), ("Rhône", "69")),
    ];
    import(&pool, fr, &before, full(LetterCase::Unchanged)).await;

    let after = vec![geonames_line(
        "FR",
        "75001",
        "Paris 01",
        ("Île-de-France", "11"),
        ("Paris", "75"),
    )];
    let report = import(&pool, fr, &after, full(LetterCase::Unchanged)).await;

    assert_eq!(report.zips.deleted, 1);
    assert_eq!(report.cities.deleted, 1);
    assert_eq!(report.boroughs.deleted, 1);
    assert_eq!(report.states.deleted, 0);

    assert_eq!(city_names(&pool, fr).await, vec!["Paris 01"]);
    assert_eq!(count(&pool, "geo_borough").await, 1);
    assert_eq!(count(&pool, "geo_state").await, 2, "States are never purged");
}

#[tokio::test]
async fn test_purge_scoped_to_country() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let ca = add_country(&pool, "CA", "Canada").await;
    import(&pool, us, &springfield_feed(), full(LetterCase::Unchanged)).await;
    let canada = vec![geonames_line("CA", "M5H", "Toronto", ("Ontario", "ON"), NO_BOROUGH)];
    import(&pool, ca, &canada, full(LetterCase::Unchanged)).await;

    let report = import(&pool, ca, &canada, full(LetterCase::Unchanged)).await;

    assert_eq!(report.total_deleted(), 0);
    assert_eq!(zip_codes(&pool, us).await, vec!["62701", "93001"]);
    assert_eq!(zip_codes(&pool, ca).await, vec!["M5H"]);
}

#[tokio::test]
async fn test_short_row_aborts_before_any_change() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let mut feed = springfield_feed();
    feed.push("US\t99999\tNowhere".to_string());

    let err = try_import(&pool, us, &feed, full(LetterCase::Unchanged))
        .await
        .unwrap_err();

    match err {
        Error::MalformedRow {
            line,
            expected,
            found,
        } => {
            assert_eq!(line, 3);
            assert_eq!(expected, 7);
            assert_eq!(found, 3);
        }
        other => panic!("Expected MalformedRow, got {:?}", other),
    }
    assert_eq!(count(&pool, "geo_state").await, 0);
}

#[tokio::test]
async fn test_short_row_beyond_cap_is_ignored() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;
    let mut feed = springfield_feed();
    feed.push("US\t99999".to_string());

    let report = import(&pool, us, &feed, capped(2)).await;

    assert_eq!(report.zips.created, 2);
    assert_eq!(report.rows_total, 3);
}

#[tokio::test]
async fn test_column_overrides_move_state_and_borough() {
    let pool = create_test_db().await;
    let overrides = ColumnOverrides {
        state_name: Some(5),
        state_code: Some(6),
        borough_name: Some(3),
        borough_code: Some(4),
    };
    let xx = add_country_with_columns(&pool, "XX", "Layoutland", overrides).await;
    let feed = vec![
        "XX\t1000\tCapital\tCentral\tC1\tNorth Province\tNP".to_string(),
        "XX\t2000\tPort\t\t\tSouth Province\tSP".to_string(),
    ];

    let report = import(&pool, xx, &feed, full(LetterCase::Unchanged)).await;

    assert_eq!(report.states.created, 2);
    assert_eq!(report.boroughs.created, 1);
    let states = geoloc_common::db::geography::list_states(&pool, xx).await.unwrap();
    let codes: Vec<&str> = states.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes, vec!["NP", "SP"]);
    let boroughs = geoloc_common::db::geography::list_boroughs(&pool, xx).await.unwrap();
    assert_eq!(boroughs[0].to_string(), "Central (C1)");
}

/// Store wrapper recording every call the reconciler makes
struct RecordingStore {
    inner: SqliteGeoStore,
    creates: Vec<(EntityKind, Vec<FieldMap>, Vec<i64>)>,
    deletes: Vec<EntityKind>,
    found: Vec<(EntityKind, i64)>,
    lookups: usize,
}

impl RecordingStore {
    async fn begin(pool: &SqlitePool) -> Self {
        Self {
            inner: SqliteGeoStore::begin(pool).await.unwrap(),
            creates: Vec::new(),
            deletes: Vec::new(),
            found: Vec::new(),
            lookups: 0,
        }
    }

    /// Ids of `kind` known before a record referencing them was created
    fn known_ids(&self, kind: EntityKind) -> HashSet<i64> {
        self.creates
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .flat_map(|(_, _, ids)| ids.iter().copied())
            .chain(self.found.iter().filter(|(k, _)| *k == kind).map(|(_, id)| *id))
            .collect()
    }
}

#[async_trait]
impl GeoStore for RecordingStore {
    async fn find_one(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<Option<i64>> {
        self.lookups += 1;
        let id = self.inner.find_one(kind, filter).await?;
        if let Some(id) = id {
            self.found.push((kind, id));
        }
        Ok(id)
    }

    async fn exists_any(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<bool> {
        self.inner.exists_any(kind, filter).await
    }

    async fn search_ids(&mut self, kind: EntityKind, filter: &FieldMap) -> Result<Vec<i64>> {
        self.inner.search_ids(kind, filter).await
    }

    async fn create_many(&mut self, kind: EntityKind, records: &[FieldMap]) -> Result<Vec<i64>> {
        let ids = self.inner.create_many(kind, records).await?;
        self.creates.push((kind, records.to_vec(), ids.clone()));
        Ok(ids)
    }

    async fn delete_many(&mut self, kind: EntityKind, ids: &[i64]) -> Result<()> {
        self.deletes.push(kind);
        self.inner.delete_many(kind, ids).await
    }

    async fn load_country(&mut self, id: i64) -> Result<Option<Country>> {
        self.inner.load_country(id).await
    }
}

fn referenced(record: &FieldMap, field: Field) -> Option<i64> {
    match record.get(field) {
        Some(FieldValue::Id(id)) => Some(*id),
        _ => None,
    }
}

#[tokio::test]
async fn test_creation_records_reference_resolved_parents() {
    let pool = create_test_db().await;
    let fr = add_country(&pool, "FR", "France").await;
    let seed = vec![geonames_line("FR", "75001", "Paris 01", ("Île-de-France", "11"), ("Paris", "75"))];
    import(&pool, fr, &seed, full(LetterCase::Unchanged)).await;

    let feed = vec![
        geonames_line("FR", "75001", "Paris 01", ("Île-de-France", "11"), ("Paris", "75")),
        geonames_line("FR", "75002", "Paris 02", ("Île-de-France", "11"), ("Paris", "75")),
        geonames_line("FR", "69001", "Lyon", ("Auvergne-Rhône-Alpes", "84"), ("Rhône", "69")),
    ];
    let mut store = RecordingStore::begin(&pool).await;
    let country = store.load_country(fr).await.unwrap().unwrap();
    reconcile(&mut store, &country, &rows(&feed), full(LetterCase::Unchanged))
        .await
        .unwrap();

    let order: Vec<EntityKind> = store.creates.iter().map(|(kind, _, _)| *kind).collect();
    assert_eq!(
        order,
        vec![EntityKind::State, EntityKind::Borough, EntityKind::City, EntityKind::Zip]
    );

    let states = store.known_ids(EntityKind::State);
    let boroughs = store.known_ids(EntityKind::Borough);
    let cities = store.known_ids(EntityKind::City);
    for (kind, records, _) in &store.creates {
        for record in records {
            if let Some(state_id) = referenced(record, Field::StateId) {
                assert!(states.contains(&state_id), "{} references unknown state", kind);
            }
            if let Some(borough_id) = referenced(record, Field::BoroughId) {
                assert!(boroughs.contains(&borough_id), "{} references unknown borough", kind);
            }
            if let Some(city_id) = referenced(record, Field::CityId) {
                assert!(cities.contains(&city_id), "{} references unknown city", kind);
            }
        }
    }

    store.inner.rollback().await.unwrap();
}

#[tokio::test]
async fn test_empty_store_skips_point_lookups() {
    let pool = create_test_db().await;
    let us = add_country(&pool, "US", "United States").await;

    let mut store = RecordingStore::begin(&pool).await;
    let country = store.load_country(us).await.unwrap().unwrap();
    reconcile(&mut store, &country, &rows(&springfield_feed()), full(LetterCase::Unchanged))
        .await
        .unwrap();

    assert_eq!(store.lookups, 0);
    assert!(store.deletes.is_empty());
    store.inner.commit().await.unwrap();

    let mut store = RecordingStore::begin(&pool).await;
    reconcile(&mut store, &country, &rows(&springfield_feed()), full(LetterCase::Unchanged))
        .await
        .unwrap();

    // One lookup per distinct key: 1 state, 2 cities, 2 zips
    assert_eq!(store.lookups, 5);
    assert!(store.creates.is_empty());
    store.inner.rollback().await.unwrap();
}

#[tokio::test]
async fn test_stale_levels_deleted_children_first() {
    let pool = create_test_db().await;
    let fr = add_country(&pool, "FR", "France").await;
    let before = vec![
        geonames_line("FR", "75001", "Paris 01", ("Île-de-France", "11"), ("Paris", "75")),
        geonames_line("FR", "69001", "Lyon", ("Auvergne-Rhône-Alpes", "84"), ("Rhône", "69")),
    ];
    import(&pool, fr, &before, full(LetterCase::Unchanged)).await;

    let after = vec![geonames_line("FR", "75001", "Paris 01", ("Île-de-France", "11"), ("Paris", "75"))];
    let mut store = RecordingStore::begin(&pool).await;
    let country = store.load_country(fr).await.unwrap().unwrap();
    reconcile(&mut store, &country, &rows(&after), full(LetterCase::Unchanged))
        .await
        .unwrap();

    assert_eq!(
        store.deletes,
        vec![EntityKind::Zip, EntityKind::City, EntityKind::Borough]
    );
    store.inner.rollback().await.unwrap();
}
