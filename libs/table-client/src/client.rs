use tokio_util::sync::CancellationToken;

use storage_core::{AuthenticatedTransport, HttpRequest, StorageError};

use crate::batch::{BATCH_VERSION, encode_batch};
use crate::entity::encode_record;
use crate::pager::{PageStream, Pager, first_page};
use crate::query::{QueryExecutor, TableQuery, validate_table_name};
use crate::record::TableRecord;

/// Table service client: queries (eager or paged), single inserts and
/// batch inserts over one shared [`AuthenticatedTransport`].
#[derive(Debug, Clone)]
pub struct TableClient {
    auth: AuthenticatedTransport,
    executor: QueryExecutor,
}

impl TableClient {
    pub fn new(auth: AuthenticatedTransport) -> Self {
        let executor = QueryExecutor::new(auth.clone());
        Self { auth, executor }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Unsigned table URI, as used inside batch sub-requests.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.auth.service_url("table"))
    }

    /// First page of a query as raw response text.
    pub async fn query_raw(&self, table: &str, query: &TableQuery) -> Result<String, StorageError> {
        let response = self.executor.fetch_page(table, query, None).await?;
        response.response.text()
    }

    /// First page of a query, decoded. Further pages are not fetched.
    pub async fn query_entities(&self, table: &str, query: &TableQuery) -> Result<Vec<TableRecord>, StorageError> {
        first_page(&self.executor, table, query).await
    }

    pub fn pager(&self, table: &str, query: TableQuery, cancel: CancellationToken) -> Pager {
        Pager::new(self.executor.clone(), table, query, cancel)
    }

    /// Every page of a query, fetched lazily as the stream is polled.
    pub fn query_pages(&self, table: &str, query: TableQuery, cancel: CancellationToken) -> PageStream {
        self.pager(table, query, cancel).into_stream()
    }

    /// Insert one entity. Returns the response body.
    pub async fn insert(&self, table: &str, partition_key: &str, record: &TableRecord) -> Result<String, StorageError> {
        validate_table_name(table)?;
        let entry = encode_record(partition_key, record)?;
        let request = HttpRequest::post(self.auth.signed_url("table", table))
            .header("content-type", "application/atom+xml")?
            .body(entry);

        let response = self.auth.send(request).await?;
        tracing::info!(table = %table, partition_key = %partition_key, row_key = %record.row_key(), "inserted entity");
        response.text()
    }

    /// Insert `records` as one atomic batch. All records must belong to
    /// `partition_key`. Returns the multipart response body.
    pub async fn insert_batch(
        &self,
        table: &str,
        partition_key: &str,
        records: &[TableRecord],
    ) -> Result<String, StorageError> {
        validate_table_name(table)?;
        let batch = encode_batch(&self.table_url(table), partition_key, records)?;
        let operations = batch.operations();
        let request = HttpRequest::post(self.auth.signed_url("table", "$batch"))
            .header("x-ms-version", BATCH_VERSION)?
            .header("content-type", &batch.content_type())?
            .body(batch.into_body());

        let response = self.auth.send(request).await?;
        tracing::info!(table = %table, partition_key = %partition_key, operations, "submitted batch");
        response.text()
    }
}
