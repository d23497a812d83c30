//! Authenticated HTTP client for the CouchDB-family remote document store.
//!
//! Exposes a small [`Transport`] trait rather than a concrete client type so
//! `vsync-engine` can be exercised against an in-memory test double without
//! a real database — the same shape [`HttpTransport`] implements against
//! `reqwest`.

pub mod http;

use futures::Stream;
use std::pin::Pin;
use vsync_core::SyncResult;
use vsync_core::doc::RemoteDoc;

pub use http::HttpTransport;

/// Outcome of a document PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// Accepted; carries the new `_rev`.
    Ok(String),
    /// `_rev` mismatch — never surfaced as an error, callers decide how to retry.
    Conflict,
}

/// A stream of documents returned by a range scan, in ascending key order.
pub type DocStream<'a> = Pin<Box<dyn Stream<Item = SyncResult<RemoteDoc>> + Send + 'a>>;

/// The remote store's document protocol.
///
/// All operations that fail for reasons other than "no such document" or
/// "revision conflict" surface as [`vsync_core::SyncError::Transport`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a single document by id. `None` on 404.
    async fn get(&self, doc_id: &str) -> SyncResult<Option<RemoteDoc>>;

    /// Cheap existence probe — `true` iff the document exists.
    async fn head(&self, doc_id: &str) -> SyncResult<bool>;

    /// Write a document. A `_rev` conflict resolves to `Ok(PutOutcome::Conflict)`,
    /// never an `Err`.
    async fn put(&self, doc: RemoteDoc) -> SyncResult<PutOutcome>;

    /// Fetch many documents by id in one round trip. Ids with no matching
    /// document are simply absent from the returned map.
    async fn bulk_get(&self, doc_ids: &[String]) -> SyncResult<std::collections::HashMap<String, RemoteDoc>>;

    /// Enumerate documents with `startkey <= key <= endkey` (bounds inclusive),
    /// in ascending lexicographic order. `None` leaves that bound open.
    fn range_scan<'a>(&'a self, startkey: Option<String>, endkey: Option<String>) -> DocStream<'a>;
}

/// Extract `_id` from any decoded document variant.
pub(crate) fn doc_id_of(doc: &RemoteDoc) -> String {
    match doc {
        RemoteDoc::FileInline(f) | RemoteDoc::FileChunked(f) => f.id.clone(),
        RemoteDoc::Leaf(l) => l.id.clone(),
        RemoteDoc::Unknown(r) => r.id.clone(),
    }
}
