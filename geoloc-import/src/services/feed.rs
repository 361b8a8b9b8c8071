//! Feed rows and the record source interface

use async_trait::async_trait;
use geoloc_common::db::models::Country;
use geoloc_common::{Error, Result};

/// One tab-separated record of the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based line number in the extracted table
    pub line: usize,
    pub fields: Vec<String>,
}

impl Row {
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at a zero-based column
    pub fn field(&self, index: usize) -> Result<&str> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or(Error::MalformedRow {
                line: self.line,
                expected: index + 1,
                found: self.fields.len(),
            })
    }
}

/// Split table text into rows
///
/// Plain tab splitting, no quoting. Blank lines are skipped but still
/// count towards line numbers.
pub fn parse_rows(text: &str) -> Vec<Row> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            Row::new(index + 1, line.split('\t').map(str::to_string).collect())
        })
        .collect()
}

/// Supplies the parsed feed for a country
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every row of the country's table, in feed order
    async fn fetch(&self, country: &Country) -> Result<Vec<Row>>;
}
