//! Configuration resolution for geoloc-import
//!
//! The feed URL is resolved with CLI → Database → ENV → TOML → default
//! priority; letter case and timeout come from CLI or TOML.

use crate::models::LetterCase;
use crate::services::geonames_client::{CODE_PLACEHOLDER, DEFAULT_GEONAMES_URL, DEFAULT_TIMEOUT_SECS};
use geoloc_common::config::TomlConfig;
use geoloc_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the feed URL template
pub const GEONAMES_URL_ENV: &str = "GEOLOC_GEONAMES_URL";

/// Resolve the archive URL template
///
/// **Priority:** CLI → Database → ENV → TOML → built-in default
pub async fn resolve_geonames_url(
    cli_url: Option<&str>,
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<String> {
    let db_url = geoloc_common::db::settings::get_geonames_url(db).await?;
    let env_url = std::env::var(GEONAMES_URL_ENV).ok();

    let candidates = [
        ("command line", cli_url.map(str::to_string)),
        ("database", db_url),
        ("environment", env_url),
        ("TOML", toml_config.geonames.url.clone()),
    ];

    let configured: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, url)| url.filter(|u| is_valid_url(u)).map(|u| (source, u)))
        .collect();

    // Warn if multiple sources (potential misconfiguration)
    if configured.len() > 1 {
        let sources: Vec<&str> = configured.iter().map(|(source, _)| *source).collect();
        warn!(
            "Geonames URL found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let url = match configured.into_iter().next() {
        Some((source, url)) => {
            info!("Geonames URL loaded from {}", source);
            url
        }
        None => DEFAULT_GEONAMES_URL.to_string(),
    };

    validate_url_template(&url)?;
    Ok(url)
}

/// Persist the archive URL template as the database setting
///
/// The template is validated first so a bad value never reaches the store.
pub async fn save_geonames_url(db: &Pool<Sqlite>, url: &str) -> Result<()> {
    let url = url.trim();
    if !is_valid_url(url) {
        return Err(Error::Config("Geonames URL must not be empty".to_string()));
    }
    validate_url_template(url)?;

    geoloc_common::db::settings::set_geonames_url(db, url.to_string()).await?;
    info!(url = %url, "Geonames URL saved to database");
    Ok(())
}

/// Non-empty, non-whitespace
pub fn is_valid_url(url: &str) -> bool {
    !url.trim().is_empty()
}

/// A template must name where the country code goes
pub fn validate_url_template(url: &str) -> Result<()> {
    if url.contains(CODE_PLACEHOLDER) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Geonames URL '{}' must contain the {} placeholder, e.g. {}",
            url, CODE_PLACEHOLDER, DEFAULT_GEONAMES_URL
        )))
    }
}

/// Resolve letter case: CLI → TOML → unchanged
pub fn resolve_letter_case(cli: Option<LetterCase>, toml_config: &TomlConfig) -> Result<LetterCase> {
    if let Some(letter_case) = cli {
        return Ok(letter_case);
    }

    match &toml_config.geonames.letter_case {
        Some(value) => value.parse(),
        None => Ok(LetterCase::default()),
    }
}

/// Download timeout from TOML, default five minutes
pub fn resolve_timeout(toml_config: &TomlConfig) -> Duration {
    Duration::from_secs(
        toml_config
            .geonames
            .timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
    )
}
