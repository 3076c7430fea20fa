use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::config::StorageConfig;
use crate::error::StorageError;

// ═══════════════════════════════════════════════════════════════
//  Request / response values
// ═══════════════════════════════════════════════════════════════

/// One fully-formed HTTP request. The transport sends it as-is.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Add a header. Names are case-insensitive; an invalid name or value
    /// is an `EncodingPrecondition` error.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, StorageError> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StorageError::precondition(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| StorageError::precondition(format!("header {name}: {e}")))?;
        self.headers.insert(header, value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Buffered HTTP response: status, headers and the whole body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// First value of a header as text. Non-UTF-8 values count as absent.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Turn a non-success status into `StorageError::HttpStatus`
    /// carrying the body for inspection.
    pub fn error_for_status(self) -> Result<Self, StorageError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(StorageError::HttpStatus {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }

    pub fn text(&self) -> Result<String, StorageError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| StorageError::decode(format!("response body is not UTF-8: {e}")))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Transport seam
// ═══════════════════════════════════════════════════════════════

/// The HTTP transport. Connection pooling, TLS, timeouts and
/// socket-level retries all live behind this trait.
///
/// Implementations must be shareable across concurrent calls; the
/// clients hold no other mutable state.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, StorageError>> + Send + '_>>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Client with the `MaxDataServiceVersion` default header and the
    /// configured timeout.
    pub fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let mut defaults = HeaderMap::new();
        let version = HeaderValue::from_str(&cfg.max_data_service_version).map_err(|e| {
            StorageError::Config {
                context: "max_data_service_version",
                detail: e.to_string(),
            }
        })?;
        defaults.insert(HeaderName::from_static("maxdataserviceversion"), version);

        let mut builder = reqwest::Client::builder().default_headers(defaults);
        if let Some(secs) = cfg.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|e| StorageError::Config {
            context: "http client",
            detail: e.to_string(),
        })?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, StorageError>> + Send + '_>> {
        Box::pin(async move {
            let resp = self
                .http
                .request(request.method, &request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp
                .bytes()
                .await
                .map_err(|e| StorageError::transport(format!("read body: {e}")))?;

            Ok(HttpResponse { status, headers, body })
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  AuthenticatedTransport
// ═══════════════════════════════════════════════════════════════

/// Account settings plus a transport handle, shared by the table and
/// blob clients. Cloning is cheap; the transport sits behind an `Arc`.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    account: String,
    signature: Option<String>,
    scheme: String,
    endpoint_suffix: String,
    transport: Arc<dyn Transport>,
}

impl AuthenticatedTransport {
    /// Default `reqwest` transport authenticated by a shared-access
    /// signature query suffix.
    pub fn with_signature(
        account: impl Into<String>,
        shared_access_signature: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let mut cfg = StorageConfig::new(account);
        cfg.shared_access_signature = Some(shared_access_signature.into());
        Self::from_config(&cfg)
    }

    /// Wrap a transport that already authenticates its requests.
    pub fn with_transport(account: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            account: account.into(),
            signature: None,
            scheme: "http".into(),
            endpoint_suffix: "core.windows.net".into(),
            transport,
        }
    }

    pub fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        cfg.validate()?;
        let transport = ReqwestTransport::from_config(cfg)?;
        Ok(Self {
            account: cfg.account.clone(),
            signature: normalize_signature(cfg.shared_access_signature.as_deref()),
            scheme: cfg.scheme.clone(),
            endpoint_suffix: cfg.endpoint_suffix.clone(),
            transport: Arc::new(transport),
        })
    }

    /// Attach (or replace) the signature on an existing value.
    pub fn signed(mut self, shared_access_signature: &str) -> Self {
        self.signature = normalize_signature(Some(shared_access_signature));
        self
    }

    /// Override scheme and endpoint suffix, e.g. for sovereign clouds.
    pub fn with_endpoint(mut self, scheme: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self.endpoint_suffix = suffix.into();
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Signature without its leading `?`, if any.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// `{scheme}://{account}.{service}.{suffix}`
    pub fn service_url(&self, service: &str) -> String {
        format!(
            "{}://{}.{service}.{}",
            self.scheme, self.account, self.endpoint_suffix
        )
    }

    /// Service URL plus `/{path}` and the signature, when present.
    pub fn signed_url(&self, service: &str, path: &str) -> String {
        let base = self.service_url(service);
        match &self.signature {
            Some(sig) => format!("{base}/{path}?{sig}"),
            None => format!("{base}/{path}"),
        }
    }

    /// Send through the transport. Non-success statuses become
    /// `StorageError::HttpStatus`.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StorageError> {
        tracing::debug!(method = %request.method, url = %redact(&request.url), "sending request");
        let resp = self.transport.send(request).await?;
        resp.error_for_status()
    }
}

impl std::fmt::Debug for AuthenticatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedTransport")
            .field("account", &self.account)
            .field("signed", &self.signature.is_some())
            .field("scheme", &self.scheme)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .finish()
    }
}

fn normalize_signature(sig: Option<&str>) -> Option<String> {
    sig.map(|s| s.trim_start_matches('?'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strip the `sig=` value so signatures never reach the logs.
fn redact(url: &str) -> String {
    match url.find("sig=") {
        Some(start) => {
            let value_start = start + "sig=".len();
            let end = url[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..value_start], &url[end..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Echo {
        seen: Mutex<Vec<String>>,
        status: StatusCode,
    }

    impl Transport for Echo {
        fn send(
            &self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, StorageError>> + Send + '_>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(request.url);
                Ok(HttpResponse::new(self.status, "body"))
            })
        }
    }

    fn echo(status: StatusCode) -> Arc<Echo> {
        Arc::new(Echo { seen: Mutex::new(Vec::new()), status })
    }

    #[test]
    fn urls_include_account_and_signature() {
        let auth = AuthenticatedTransport::with_transport("acme", echo(StatusCode::OK))
            .signed("?sv=1&sig=x");
        assert_eq!(auth.service_url("table"), "http://acme.table.core.windows.net");
        assert_eq!(
            auth.signed_url("blob", "c/b"),
            "http://acme.blob.core.windows.net/c/b?sv=1&sig=x"
        );
        assert_eq!(auth.signature(), Some("sv=1&sig=x"));
    }

    #[test]
    fn unsigned_url_has_no_query() {
        let auth = AuthenticatedTransport::with_transport("acme", echo(StatusCode::OK))
            .with_endpoint("https", "example.net");
        assert_eq!(auth.signed_url("table", "t"), "https://acme.table.example.net/t");
    }

    #[test]
    fn empty_signature_is_ignored() {
        let auth = AuthenticatedTransport::with_transport("acme", echo(StatusCode::OK)).signed("?");
        assert_eq!(auth.signature(), None);
    }

    #[test]
    fn redact_hides_signature_value() {
        assert_eq!(redact("http://h/t?sv=1&sig=secret&se=2"), "http://h/t?sv=1&sig=***&se=2");
        assert_eq!(redact("http://h/t?sig=secret"), "http://h/t?sig=***");
        assert_eq!(redact("http://h/t"), "http://h/t");
    }

    #[tokio::test]
    async fn send_maps_failure_status() {
        let transport = echo(StatusCode::FORBIDDEN);
        let auth = AuthenticatedTransport::with_transport("acme", transport.clone());
        let err = auth
            .send(HttpRequest::get(auth.signed_url("table", "t")))
            .await
            .unwrap_err();
        match err {
            StorageError::HttpStatus { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "body");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let req = HttpRequest::post("http://h")
            .header("Content-Type", "application/atom+xml")
            .unwrap();
        assert_eq!(req.headers["content-type"], "application/atom+xml");
    }

    #[test]
    fn header_rejects_invalid_name() {
        let err = HttpRequest::get("http://h").header("bad name", "v").unwrap_err();
        assert!(matches!(err, StorageError::EncodingPrecondition(_)));
    }

    #[test]
    fn reqwest_transport_rejects_bad_data_service_version() {
        let mut cfg = StorageConfig::new("acme");
        cfg.max_data_service_version = "bad\nvalue".into();
        match ReqwestTransport::from_config(&cfg) {
            Err(StorageError::Config { context, .. }) => assert_eq!(context, "max_data_service_version"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a config error"),
        }
    }

    #[test]
    fn reqwest_transport_accepts_default_config() {
        let mut cfg = StorageConfig::new("acme");
        cfg.request_timeout_secs = Some(5);
        assert!(ReqwestTransport::from_config(&cfg).is_ok());
        assert!(AuthenticatedTransport::with_signature("acme", "?sv=1&sig=x").is_ok());
    }

    #[test]
    fn header_rejects_invalid_value() {
        let err = HttpRequest::get("http://h").header("x-ms-version", "bad\nvalue").unwrap_err();
        assert!(matches!(err, StorageError::EncodingPrecondition(_)));
    }
}
