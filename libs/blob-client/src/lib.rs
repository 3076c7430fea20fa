//! Block-blob uploads against the blob service.

use bytes::Bytes;

use storage_core::{AuthenticatedTransport, HttpRequest, StorageError};

pub const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";
pub const BLOCK_BLOB: &str = "BlockBlob";

#[derive(Debug, Clone)]
pub struct BlobClient {
    auth: AuthenticatedTransport,
}

impl BlobClient {
    pub fn new(auth: AuthenticatedTransport) -> Self {
        Self { auth }
    }

    pub fn blob_url(&self, container: &str, blob: &str) -> String {
        self.auth.signed_url("blob", &format!("{container}/{blob}"))
    }

    /// Upload `body` as a block blob, replacing any existing blob of the
    /// same name. Returns the response body.
    pub async fn put(&self, container: &str, blob: &str, body: impl Into<Bytes>) -> Result<String, StorageError> {
        if container.is_empty() || blob.is_empty() {
            return Err(StorageError::precondition("container and blob names must be non-empty"));
        }
        let body = body.into();
        let size = body.len();
        let request = HttpRequest::put(self.blob_url(container, blob))
            .header(BLOB_TYPE_HEADER, BLOCK_BLOB)?
            .body(body);

        let response = self.auth.send(request).await?;
        tracing::info!(container = %container, blob = %blob, bytes = size, "uploaded blob");
        response.text()
    }
}
