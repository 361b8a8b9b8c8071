//! geoloc-import library interface
//!
//! Imports geonames postal code dumps into the country → state →
//! borough → city → zip hierarchy. Exposed as a library so the
//! reconciler and orchestrator can be driven from integration tests.

pub mod config;
pub mod models;
pub mod services;

pub use models::{CountryReport, ImportSummary, LetterCase, LevelStats};
pub use services::import_orchestrator::{run, run_import, ImportRequest};
pub use services::{GeonamesClient, RecordSource, Row};
