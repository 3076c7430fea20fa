//! Test doubles and XML fixtures.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::{HeaderValue, StatusCode};
use tokio_util::sync::CancellationToken;

use storage_core::{HttpRequest, HttpResponse, StorageError, Transport};

use crate::entity::{ATOM_NS, DATA_NS, METADATA_NS};
use crate::query::{NEXT_PARTITION_KEY_HEADER, NEXT_ROW_KEY_HEADER};

/// Replays scripted responses in order and records every request.
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, StorageError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    sent: AtomicUsize,
    /// Cancel this token while the n-th request (1-based) is in flight.
    cancel_during: Option<(usize, CancellationToken)>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<Result<HttpResponse, StorageError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            sent: AtomicUsize::new(0),
            cancel_during: None,
        }
    }

    pub(crate) fn cancelling_during(mut self, request: usize, token: CancellationToken) -> Self {
        self.cancel_during = Some((request, token));
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, StorageError>> + Send + '_>> {
        Box::pin(async move {
            let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
            self.requests.lock().unwrap().push(request);
            if let Some((at, token)) = &self.cancel_during {
                if *at == n {
                    token.cancel();
                }
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(StorageError::transport("no scripted response left")))
        })
    }
}

/// One `m:properties` entry. Properties are `(name, m:type, text)`.
pub(crate) fn entry_xml(partition_key: &str, row_key: &str, properties: &[(&str, Option<&str>, &str)]) -> String {
    let mut props = String::new();
    for (name, edm_type, text) in properties {
        match edm_type {
            Some(t) => props.push_str(&format!("<d:{name} m:type=\"{t}\">{text}</d:{name}>")),
            None => props.push_str(&format!("<d:{name}>{text}</d:{name}>")),
        }
    }
    format!(
        "<entry><id>e</id><content type=\"application/xml\"><m:properties>\
         <d:PartitionKey>{partition_key}</d:PartitionKey><d:RowKey>{row_key}</d:RowKey>{props}\
         </m:properties></content></entry>"
    )
}

/// Atom feed wrapping the given entries.
pub(crate) fn feed(entries: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\
         <feed xmlns=\"{ATOM_NS}\" xmlns:d=\"{DATA_NS}\" xmlns:m=\"{METADATA_NS}\">\
         <title type=\"text\">t</title>{}</feed>",
        entries.concat()
    )
}

/// A 200 page holding one entity per row key, optionally truncated.
pub(crate) fn page(row_keys: &[&str], next: Option<(&str, &str)>) -> Result<HttpResponse, StorageError> {
    let entries: Vec<String> = row_keys
        .iter()
        .map(|rk| entry_xml("p", rk, &[("Value", None, rk)]))
        .collect();
    let mut resp = HttpResponse::new(StatusCode::OK, feed(&entries));
    if let Some((pk, rk)) = next {
        resp.headers.insert(NEXT_PARTITION_KEY_HEADER, HeaderValue::from_str(pk).unwrap());
        resp.headers.insert(NEXT_ROW_KEY_HEADER, HeaderValue::from_str(rk).unwrap());
    }
    Ok(resp)
}
