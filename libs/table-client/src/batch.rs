use std::collections::HashSet;

use bytes::Bytes;

use storage_core::StorageError;

use crate::entity::encode_record;
use crate::record::TableRecord;

/// Service version the batch wire format is written against.
pub const BATCH_VERSION: &str = "2009-04-14";
/// Largest changeset the service accepts.
pub const MAX_BATCH_OPERATIONS: usize = 100;

const ENTRY_CONTENT_TYPE: &str = "application/atom+xml;type=entry;charset=utf-8";

/// Encoded `multipart/mixed` body of one batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    batch_id: String,
    changeset_id: String,
    operations: usize,
    body: Bytes,
}

impl BatchRequest {
    pub fn batch_boundary(&self) -> String {
        format!("batch_{}", self.batch_id)
    }

    pub fn changeset_boundary(&self) -> String {
        format!("changeset_{}", self.changeset_id)
    }

    /// Value for the outer request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.batch_boundary())
    }

    pub fn operations(&self) -> usize {
        self.operations
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Package inserts of `records` into one batch with one changeset.
///
/// Every record is written under `partition_key`; the caller must only
/// pass rows of that partition. `table_url` is the unsigned table URI
/// each sub-request POSTs to. Boundary ids are fresh UUIDs per call.
pub fn encode_batch(
    table_url: &str,
    partition_key: &str,
    records: &[TableRecord],
) -> Result<BatchRequest, StorageError> {
    encode_batch_with_ids(
        table_url,
        partition_key,
        records,
        uuid::Uuid::new_v4().to_string(),
        uuid::Uuid::new_v4().to_string(),
    )
}

pub(crate) fn encode_batch_with_ids(
    table_url: &str,
    partition_key: &str,
    records: &[TableRecord],
    batch_id: String,
    changeset_id: String,
) -> Result<BatchRequest, StorageError> {
    check_preconditions(records)?;

    let batch = format!("batch_{batch_id}");
    let changeset = format!("changeset_{changeset_id}");

    let mut body = String::new();
    body.push_str(&format!("--{batch}\r\n"));
    body.push_str(&format!("Content-Type: multipart/mixed; boundary={changeset}\r\n\r\n"));

    for record in records {
        let entry = encode_record(partition_key, record)?;
        body.push_str(&format!("--{changeset}\r\n"));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-Transfer-Encoding: binary\r\n\r\n");
        body.push_str(&format!("POST {table_url} HTTP/1.1\r\n"));
        body.push_str(&format!("Content-Type: {ENTRY_CONTENT_TYPE}\r\n\r\n"));
        body.push_str(&entry);
        body.push_str("\r\n");
    }

    body.push_str(&format!("--{changeset}--\r\n"));
    body.push_str(&format!("--{batch}--\r\n"));

    Ok(BatchRequest {
        batch_id,
        changeset_id,
        operations: records.len(),
        body: Bytes::from(body),
    })
}

fn check_preconditions(records: &[TableRecord]) -> Result<(), StorageError> {
    if records.is_empty() {
        return Err(StorageError::precondition("batch has no operations"));
    }
    if records.len() > MAX_BATCH_OPERATIONS {
        return Err(StorageError::precondition(format!(
            "batch has {} operations, limit is {MAX_BATCH_OPERATIONS}",
            records.len()
        )));
    }
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.row_key()) {
            return Err(StorageError::precondition(format!(
                "row key '{}' appears twice in one batch",
                record.row_key()
            )));
        }
    }
    Ok(())
}
