use std::collections::BTreeMap;

use http::HeaderMap;

use storage_core::{AuthenticatedTransport, HttpRequest, HttpResponse, StorageError};

use crate::record::ContinuationToken;

pub const NEXT_PARTITION_KEY_HEADER: &str = "x-ms-continuation-nextpartitionkey";
pub const NEXT_ROW_KEY_HEADER: &str = "x-ms-continuation-nextrowkey";

// ═══════════════════════════════════════════════════════════════
//  TableQuery: OData query options
// ═══════════════════════════════════════════════════════════════

/// OData query options, rendered as `$name=value`.
///
/// Values go on the wire verbatim; build filters with
/// [`format_filter`](crate::filter::format_filter) so literals arrive
/// percent-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    params: BTreeMap<String, String>,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(self, filter: impl Into<String>) -> Self {
        self.param("filter", filter)
    }

    pub fn top(self, n: u32) -> Self {
        self.param("top", n.to_string())
    }

    pub fn select<S: AsRef<str>>(self, columns: &[S]) -> Self {
        let joined = columns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
        self.param("select", joined)
    }

    /// Arbitrary option. A leading `$` on `name` is dropped.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.strip_prefix('$').map(str::to_string).unwrap_or(name);
        self.params.insert(name, value.into());
        self
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Assemble `?part&part…`: signature first, then the continuation
/// token, then `$` options. Empty parts are skipped and the result
/// always begins with `?`.
pub fn query_string(
    signature: Option<&str>,
    continuation: Option<&ContinuationToken>,
    query: &TableQuery,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(sig) = signature {
        parts.push(sig.trim_start_matches('?').to_string());
    }
    if let Some(token) = continuation {
        parts.push(format!("NextPartitionKey={}", token.next_partition_key()));
        parts.push(format!("NextRowKey={}", token.next_row_key()));
    }
    parts.extend(query.params().map(|(k, v)| format!("${k}={v}")));

    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("&");
    format!("?{joined}")
}

/// Token from the response headers. Both headers must be present;
/// a missing one marks the final page.
pub fn continuation_from_headers(headers: &HeaderMap) -> Option<ContinuationToken> {
    let pk = headers.get(NEXT_PARTITION_KEY_HEADER)?.to_str().ok()?;
    let rk = headers.get(NEXT_ROW_KEY_HEADER)?.to_str().ok()?;
    Some(ContinuationToken::new(pk, rk))
}

// ═══════════════════════════════════════════════════════════════
//  QueryExecutor: one page per call
// ═══════════════════════════════════════════════════════════════

/// Raw response of one page plus the token for the next request.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub response: HttpResponse,
    pub continuation: Option<ContinuationToken>,
}

/// Issues a single GET per page. Decoding and retries are left to the
/// caller.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    auth: AuthenticatedTransport,
}

impl QueryExecutor {
    pub fn new(auth: AuthenticatedTransport) -> Self {
        Self { auth }
    }

    pub fn page_url(&self, table: &str, query: &TableQuery, continuation: Option<&ContinuationToken>) -> String {
        format!(
            "{}/{table}{}",
            self.auth.service_url("table"),
            query_string(self.auth.signature(), continuation, query)
        )
    }

    pub async fn fetch_page(
        &self,
        table: &str,
        query: &TableQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<PageResponse, StorageError> {
        validate_table_name(table)?;
        let url = self.page_url(table, query, continuation);
        let request =
            HttpRequest::get(url).header("accept", "application/atom+xml,application/xml")?;

        let response = self.auth.send(request).await?;
        let continuation = continuation_from_headers(&response.headers);
        tracing::debug!(
            table = %table,
            bytes = response.body.len(),
            more = continuation.is_some(),
            "fetched page"
        );
        Ok(PageResponse { response, continuation })
    }
}

/// Table names are alphanumeric; anything else would change the path
/// or query of the request URI.
pub(crate) fn validate_table_name(table: &str) -> Result<(), StorageError> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StorageError::precondition(format!("invalid table name '{table}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::{HeaderName, HeaderValue, StatusCode};

    use super::*;
    use crate::testing::{ScriptedTransport, page};

    #[test]
    fn query_string_with_token_and_filter() {
        let token = ContinuationToken::new("pk", "rk");
        let q = query_string(None, Some(&token), &TableQuery::new().filter("foo"));

        assert!(q.starts_with('?'));
        assert!(!q.ends_with('&'));
        let parts: Vec<_> = q[1..].split('&').collect();
        assert_eq!(parts.iter().filter(|p| **p == "NextPartitionKey=pk").count(), 1);
        assert_eq!(parts.iter().filter(|p| **p == "NextRowKey=rk").count(), 1);
        assert_eq!(parts.iter().filter(|p| **p == "$filter=foo").count(), 1);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn query_string_leads_with_signature() {
        let q = query_string(Some("?sv=1&sig=abc"), None, &TableQuery::new().top(5));
        assert_eq!(q, "?sv=1&sig=abc&$top=5");
    }

    #[test]
    fn query_string_skips_empty_parts() {
        assert_eq!(query_string(Some(""), None, &TableQuery::new()), "?");
        assert_eq!(
            query_string(None, None, &TableQuery::new().param("$select", "")),
            "?$select="
        );
    }

    #[test]
    fn select_joins_columns_and_dollar_is_not_doubled() {
        let q = TableQuery::new().select(&["A", "B"]).param("$expand", "x");
        let params: Vec<_> = q.params().collect();
        assert_eq!(params, [("expand", "x"), ("select", "A,B")]);
    }

    #[test]
    fn continuation_needs_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(NEXT_ROW_KEY_HEADER, HeaderValue::from_static("rk"));
        assert!(continuation_from_headers(&headers).is_none());

        let mixed_case = HeaderName::from_bytes(b"x-ms-continuation-NextPartitionKey").unwrap();
        headers.insert(mixed_case, HeaderValue::from_static("pk"));
        let token = continuation_from_headers(&headers).unwrap();
        assert_eq!(token, ContinuationToken::new("pk", "rk"));
    }

    #[tokio::test]
    async fn fetch_page_builds_uri_and_extracts_token() {
        let transport = Arc::new(ScriptedTransport::new(vec![page(&["a"], Some(("p2", "r2")))]));
        let auth = AuthenticatedTransport::with_transport("acme", transport.clone()).signed("sig=s");
        let executor = QueryExecutor::new(auth);

        let token = ContinuationToken::new("p1", "r1");
        let resp = executor
            .fetch_page("metrics", &TableQuery::new().filter("x"), Some(&token))
            .await
            .unwrap();

        assert_eq!(resp.continuation, Some(ContinuationToken::new("p2", "r2")));
        let urls = transport.urls();
        assert_eq!(
            urls,
            ["http://acme.table.core.windows.net/metrics?sig=s&NextPartitionKey=p1&NextRowKey=r1&$filter=x"]
        );
    }

    #[tokio::test]
    async fn fetch_page_surfaces_status_and_body() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(storage_core::HttpResponse::new(
            StatusCode::NOT_FOUND,
            "TableNotFound",
        ))]));
        let executor = QueryExecutor::new(AuthenticatedTransport::with_transport("acme", transport));
        let err = executor.fetch_page("missing", &TableQuery::new(), None).await.unwrap_err();
        match err {
            StorageError::HttpStatus { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "TableNotFound");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn bad_table_name_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let executor = QueryExecutor::new(AuthenticatedTransport::with_transport("acme", transport.clone()));
        let err = executor.fetch_page("a/b?c", &TableQuery::new(), None).await.unwrap_err();
        assert!(matches!(err, StorageError::EncodingPrecondition(_)));
        assert_eq!(transport.request_count(), 0);
    }
}
