//! Common error types for geoloc

use thiserror::Error;

/// Common result type for geoloc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the geoloc crates
#[derive(Error, Debug)]
pub enum Error {
    /// Remote endpoint answered with a non-success status
    #[error("Got an error {status} when trying to download the file {url}")]
    Fetch { status: u16, url: String },

    /// Remote endpoint could not be reached at all
    #[error("Download of {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Downloaded archive does not contain the expected table
    #[error("File {name} not found in archive downloaded from {url}")]
    MissingArchiveEntry { name: String, url: String },

    /// Archive could not be opened or decompressed
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feed row shorter than the configured column layout requires
    #[error("Malformed row at line {line}: expected at least {expected} fields, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A child level referenced a parent key the previous pass never resolved
    #[error("Unresolved {level} reference: {key}")]
    UnresolvedReference { level: &'static str, key: String },
}

impl Error {
    /// Remote archive unreachable, failed, or missing its table
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Error::Fetch { .. }
                | Error::Transport { .. }
                | Error::MissingArchiveEntry { .. }
                | Error::Archive(_)
        )
    }

    /// Any create/search/delete failure reported by the record store
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}
