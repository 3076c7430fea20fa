use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use storage_core::StorageError;

/// EDM type tag for date-time properties.
pub const EDM_DATETIME: &str = "Edm.DateTime";

/// Typed property value.
///
/// Only the two types the wire format distinguishes are modeled:
/// untagged text and `Edm.DateTime`. Every other EDM type decodes to
/// `String`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            PropertyValue::DateTime(_) => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::DateTime(dt) => Some(*dt),
            PropertyValue::String(_) => None,
        }
    }

    /// The `m:type` attribute this value carries on the wire.
    pub fn edm_type(&self) -> Option<&'static str> {
        match self {
            PropertyValue::DateTime(_) => Some(EDM_DATETIME),
            PropertyValue::String(_) => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::DateTime(dt) => f.write_str(&format_datetime(dt)),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(dt: DateTime<Utc>) -> Self {
        PropertyValue::DateTime(dt)
    }
}

/// UTC RFC 3339 with `Z` and only as many fractional digits as needed.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a wire date-time. Values without an offset are taken as UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| StorageError::decode(format!("invalid date-time '{s}': {e}")))
}
