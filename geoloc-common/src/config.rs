//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "GEOLOC_ROOT_FOLDER";

/// Environment variable naming the database file directly
pub const DATABASE_ENV: &str = "GEOLOC_DATABASE";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "geoloc.db";

/// Contents of `geoloc.toml`
///
/// Every key is optional; a missing file behaves like an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database when `database` is not set
    pub root_folder: Option<String>,
    /// Explicit database file path
    pub database: Option<String>,
    #[serde(default)]
    pub geonames: GeonamesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[geonames]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeonamesConfig {
    /// Archive URL template, `{code}` is replaced by the country code
    pub url: Option<String>,
    /// HTTP request timeout for one archive download
    pub timeout_secs: Option<u64>,
    /// Default letter case (`unchanged`, `title`, `upper`)
    pub letter_case: Option<String>,
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is not set
    pub level: Option<String>,
}

/// Parse TOML text into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the TOML config
///
/// An explicit path must exist. Without one, the platform default
/// locations are tried and an absent file yields the default config.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = parse_toml_config(&content)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Get the first existing default config file for the platform
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("geoloc").join("geoloc.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/geoloc/geoloc.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = &toml_config.root_folder {
        return PathBuf::from(root_folder);
    }

    get_default_root_folder()
}

/// Database path resolution in priority order:
/// 1. Command-line argument
/// 2. `GEOLOC_DATABASE` environment variable
/// 3. TOML `database` key
/// 4. `geoloc.db` inside the resolved root folder
pub fn resolve_database_path(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATABASE_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(database) = &toml_config.database {
        return PathBuf::from(database);
    }

    resolve_root_folder(None, toml_config).join(DATABASE_FILE_NAME)
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/geoloc (or /var/lib/geoloc for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("geoloc"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/geoloc"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("geoloc"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/geoloc"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("geoloc"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\geoloc"))
    } else {
        PathBuf::from("./geoloc_data")
    }
}
