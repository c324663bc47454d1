//! Date parsing for inbound payloads and report filters
//!
//! Clients send `MM/DD/YYYY`; ISO `YYYY-MM-DD` is accepted as well.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::{DataAccessError, Result};

const US_FORMAT: &str = "%m/%d/%Y";
const ISO_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, US_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, ISO_FORMAT))
        .map_err(|_| {
            DataAccessError::validation(format!(
                "date '{}' must be MM/DD/YYYY or YYYY-MM-DD",
                input
            ))
        })
}

/// Empty or missing strings mean "no date"
pub fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

/// `#[serde(deserialize_with = "...")]` helper for `Option<NaiveDate>` fields
pub fn deserialize_optional<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    parse_optional_date(raw.as_deref()).map_err(serde::de::Error::custom)
}
