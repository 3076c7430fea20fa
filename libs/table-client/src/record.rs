use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::PropertyValue;

// ═══════════════════════════════════════════════════════════════
//  TableRecord
// ═══════════════════════════════════════════════════════════════

/// One logical table row.
///
/// The partition key is not stored here: writes take it per call, since
/// a batch targets a single partition. `row_key` is fixed at
/// construction; `properties` stays open for the caller to edit before
/// re-submitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    #[serde(default = "new_row_key")]
    row_key: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    /// Set by the service on read, ignored on write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

fn new_row_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl TableRecord {
    /// Record with a freshly generated random row key.
    pub fn new(properties: BTreeMap<String, PropertyValue>) -> Self {
        Self::with_row_key(new_row_key(), properties)
    }

    pub fn with_row_key(row_key: impl Into<String>, properties: BTreeMap<String, PropertyValue>) -> Self {
        Self {
            row_key: row_key.into(),
            properties,
            timestamp: None,
        }
    }

    pub(crate) fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Builder-style property insert.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════
//  ContinuationToken / Page
// ═══════════════════════════════════════════════════════════════

/// Opaque `(NextPartitionKey, NextRowKey)` pair from a truncated page.
/// Only meaningful for the very next request of the same query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    next_partition_key: String,
    next_row_key: String,
}

impl ContinuationToken {
    pub fn new(next_partition_key: impl Into<String>, next_row_key: impl Into<String>) -> Self {
        Self {
            next_partition_key: next_partition_key.into(),
            next_row_key: next_row_key.into(),
        }
    }

    pub fn next_partition_key(&self) -> &str {
        &self.next_partition_key
    }

    pub fn next_row_key(&self) -> &str {
        &self.next_row_key
    }
}

/// Records decoded from one response body, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<TableRecord>,
    pub(crate) continuation: Option<ContinuationToken>,
}

impl Page {
    /// True when the service sent no continuation token.
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }

    pub fn continuation(&self) -> Option<&ContinuationToken> {
        self.continuation.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<TableRecord> {
        self.records
    }
}
