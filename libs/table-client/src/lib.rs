//! Client for the table service's Atom/OData REST protocol: entity
//! encoding, filter formatting, continuation-token paging and
//! multipart batch inserts.

pub mod batch;
pub mod client;
pub mod entity;
pub mod filter;
pub mod pager;
pub mod query;
pub mod record;
pub mod value;

#[cfg(test)]
mod testing;

pub use batch::{BatchRequest, encode_batch};
pub use client::TableClient;
pub use entity::{decode_entries, encode_entry, encode_record};
pub use filter::{format_filter, quote_value};
pub use pager::{PageStream, Pager};
pub use query::{PageResponse, QueryExecutor, TableQuery};
pub use record::{ContinuationToken, Page, TableRecord};
pub use value::PropertyValue;

pub use tokio_util::sync::CancellationToken;
