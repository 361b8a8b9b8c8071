//! Service modules for the geonames import
//!
//! - `feed`: row parsing and the record source interface
//! - `geonames_client`: HTTP archive download and extraction
//! - `reconciler`: per-level passes and the purge
//! - `import_orchestrator`: per-country driver and transaction scope

pub mod feed;
pub mod geonames_client;
pub mod import_orchestrator;
pub mod reconciler;

pub use feed::{parse_rows, RecordSource, Row};
pub use geonames_client::{extract_single_file, GeonamesClient};
pub use reconciler::{reconcile, ReconcileOptions};
