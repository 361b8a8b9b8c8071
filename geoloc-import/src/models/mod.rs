//! Data models for geoloc-import

pub mod column_layout;
pub mod import_result;
pub mod letter_case;

pub use column_layout::ColumnLayout;
pub use import_result::{CountryReport, ImportSummary, LevelStats};
pub use letter_case::{normalize, LetterCase};
