//! Shared plumbing for the storage clients: account settings, the
//! HTTP transport seam, and the error taxonomy.

pub mod config;
pub mod error;
pub mod transport;

pub use config::StorageConfig;
pub use error::{ErrorKind, StorageError};
pub use transport::{AuthenticatedTransport, HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub use bytes::Bytes;
pub use http::{HeaderMap, Method, StatusCode};
