//! Name normalization
//!
//! Human-readable state, borough and city names pass through
//! [`normalize`] before they are used as lookup or creation keys. Codes
//! and zip identifiers are never normalized.

use geoloc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Case transform applied to imported names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LetterCase {
    /// Keep names exactly as the feed spells them
    #[default]
    Unchanged,
    /// Upper case on the first letter of each word
    Title,
    /// All letters upper case
    Upper,
}

impl LetterCase {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterCase::Unchanged => "unchanged",
            LetterCase::Title => "title",
            LetterCase::Upper => "upper",
        }
    }
}

impl fmt::Display for LetterCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterCase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unchanged" => Ok(LetterCase::Unchanged),
            "title" => Ok(LetterCase::Title),
            "upper" => Ok(LetterCase::Upper),
            other => Err(Error::Config(format!(
                "Unknown letter case '{}' (expected unchanged, title or upper)",
                other
            ))),
        }
    }
}

/// Apply a letter case mode to a name
pub fn normalize(raw: &str, mode: LetterCase) -> String {
    match mode {
        LetterCase::Unchanged => raw.to_string(),
        LetterCase::Title => title_case(raw),
        LetterCase::Upper => raw.to_uppercase(),
    }
}

/// Word-initial letters upper case, every other letter lower case
///
/// A word starts at any letter that follows a non-letter, so
/// "saint-étienne" becomes "Saint-Étienne" and "o'brien" becomes "O'Brien".
fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_is_letter = false;

    for c in raw.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }

    out
}
