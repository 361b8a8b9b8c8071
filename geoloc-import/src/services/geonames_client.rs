//! Geonames postal code archive client
//!
//! Downloads `<CODE>.zip` for a country, extracts `<CODE>.txt` and parses
//! it into feed rows.

use crate::services::feed::{parse_rows, RecordSource, Row};
use async_trait::async_trait;
use geoloc_common::db::models::Country;
use geoloc_common::{Error, Result};
use std::io::{Cursor, Read};
use std::time::Duration;

pub const DEFAULT_GEONAMES_URL: &str = "http://download.geonames.org/export/zip/{code}.zip";
pub const CODE_PLACEHOLDER: &str = "{code}";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
const USER_AGENT: &str = concat!("geoloc-import/", env!("CARGO_PKG_VERSION"));

/// HTTP record source for the geonames postal code dump
pub struct GeonamesClient {
    http_client: reqwest::Client,
    url_template: String,
}

impl GeonamesClient {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url_template = url_template.into();
        if !url_template.contains(CODE_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "Geonames URL template '{}' has no {} placeholder",
                url_template, CODE_PLACEHOLDER
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url_template,
        })
    }

    /// Archive URL for a country code
    pub fn archive_url(&self, country_code: &str) -> String {
        self.url_template.replace(CODE_PLACEHOLDER, country_code)
    }

    /// Download the archive body
    pub async fn fetch_archive(&self, url: &str) -> Result<Vec<u8>> {
        tracing::info!(url = %url, "Starting to download");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| Error::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!(url = %url, bytes = bytes.len(), "Archive downloaded");
        Ok(bytes.to_vec())
    }
}

/// Read one named entry of a zip archive as UTF-8 text
pub fn extract_single_file(bytes: &[u8], name: &str, url: &str) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(Error::MissingArchiveEntry {
                name: name.to_string(),
                url: url.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    // Undecodable entry content is an archive fault, not a local I/O one
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(zip::result::ZipError::Io)?;
    Ok(text)
}

#[async_trait]
impl RecordSource for GeonamesClient {
    async fn fetch(&self, country: &Country) -> Result<Vec<Row>> {
        let url = self.archive_url(&country.code);
        let bytes = self.fetch_archive(&url).await?;

        let entry_name = format!("{}.txt", country.code);
        let text = extract_single_file(&bytes, &entry_name, &url)?;
        let rows = parse_rows(&text);

        tracing::info!(
            country = %country.code,
            rows = rows.len(),
            "The geonames zipfile has been decompressed"
        );

        Ok(rows)
    }
}
