//! In-memory [`Transport`] double used by this crate's integration tests.
//!
//! Mirrors the remote store's optimistic-concurrency contract closely enough
//! to exercise conflict retries and range scans without a live CouchDB:
//! every `put` bumps a monotonically increasing revision and a `_rev`
//! mismatch resolves to [`PutOutcome::Conflict`] rather than an error.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use vsync_core::doc::RemoteDoc;
use vsync_core::error::SyncResult;
use vsync_transport::{DocStream, PutOutcome, Transport};

#[derive(Default)]
pub struct FakeTransport {
    docs: Mutex<HashMap<String, RemoteDoc>>,
    rev_counter: Mutex<u64>,
}

impl FakeTransport {
    pub fn new() -> Self {
        FakeTransport::default()
    }

    /// Insert a document directly, bypassing the conflict check — useful to
    /// set up a test's starting remote state.
    pub fn seed(&self, doc: RemoteDoc) {
        let id = doc_id(&doc);
        self.docs.lock().unwrap().insert(id, doc);
    }

    pub fn doc_count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn get_raw(&self, id: &str) -> Option<RemoteDoc> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    fn next_rev(&self) -> String {
        let mut counter = self.rev_counter.lock().unwrap();
        *counter += 1;
        format!("{}-fake", *counter)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, doc_id: &str) -> SyncResult<Option<RemoteDoc>> {
        Ok(self.docs.lock().unwrap().get(doc_id).cloned())
    }

    async fn head(&self, doc_id: &str) -> SyncResult<bool> {
        Ok(self.docs.lock().unwrap().contains_key(doc_id))
    }

    async fn put(&self, doc: RemoteDoc) -> SyncResult<PutOutcome> {
        let id = doc_id(&doc);
        let incoming_rev = doc_rev(&doc);

        let mut docs = self.docs.lock().unwrap();
        let current_rev = docs.get(&id).and_then(doc_rev);
        if incoming_rev != current_rev {
            return Ok(PutOutcome::Conflict);
        }

        let new_rev = self.next_rev();
        let mut doc = doc;
        set_rev(&mut doc, new_rev.clone());
        docs.insert(id, doc);
        Ok(PutOutcome::Ok(new_rev))
    }

    async fn bulk_get(&self, doc_ids: &[String]) -> SyncResult<HashMap<String, RemoteDoc>> {
        let docs = self.docs.lock().unwrap();
        Ok(doc_ids
            .iter()
            .filter_map(|id| docs.get(id).cloned().map(|d| (id.clone(), d)))
            .collect())
    }

    fn range_scan<'a>(&'a self, startkey: Option<String>, endkey: Option<String>) -> DocStream<'a> {
        let docs = self.docs.lock().unwrap();
        let mut keys: Vec<String> = docs.keys().cloned().collect();
        keys.sort();

        let items: Vec<SyncResult<RemoteDoc>> = keys
            .into_iter()
            .filter(|k| startkey.as_deref().map_or(true, |sk| k.as_str() >= sk))
            .filter(|k| endkey.as_deref().map_or(true, |ek| k.as_str() <= ek))
            .map(|k| Ok(docs.get(&k).cloned().expect("key came from this map")))
            .collect();

        Box::pin(stream::iter(items))
    }
}

fn doc_id(doc: &RemoteDoc) -> String {
    match doc {
        RemoteDoc::FileInline(f) | RemoteDoc::FileChunked(f) => f.id.clone(),
        RemoteDoc::Leaf(l) => l.id.clone(),
        RemoteDoc::Unknown(r) => r.id.clone(),
    }
}

fn doc_rev(doc: &RemoteDoc) -> Option<String> {
    match doc {
        RemoteDoc::FileInline(f) | RemoteDoc::FileChunked(f) => f.rev.clone(),
        RemoteDoc::Leaf(l) => l.rev.clone(),
        RemoteDoc::Unknown(r) => r.rev.clone(),
    }
}

fn set_rev(doc: &mut RemoteDoc, rev: String) {
    match doc {
        RemoteDoc::FileInline(f) | RemoteDoc::FileChunked(f) => f.rev = Some(rev),
        RemoteDoc::Leaf(l) => l.rev = Some(rev),
        RemoteDoc::Unknown(r) => r.rev = Some(rev),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsync_core::doc::new_leaf;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let t = FakeTransport::new();
        let outcome = t.put(new_leaf("h:abc", "hello")).await.unwrap();
        assert!(matches!(outcome, PutOutcome::Ok(_)));

        let fetched = t.get("h:abc").await.unwrap().unwrap();
        match fetched {
            RemoteDoc::Leaf(l) => assert_eq!(l.data, "hello"),
            other => panic!("expected Leaf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_rev_is_a_conflict() {
        let t = FakeTransport::new();
        t.put(new_leaf("h:abc", "v1")).await.unwrap();

        // Second writer tries to create from scratch (no rev) against an
        // already-populated id — same shape as a racing push.
        let outcome = t.put(new_leaf("h:abc", "v2")).await.unwrap();
        assert_eq!(outcome, PutOutcome::Conflict);
    }

    #[tokio::test]
    async fn range_scan_respects_bounds() {
        let t = FakeTransport::new();
        t.put(new_leaf("h:aaa", "x")).await.unwrap();
        t.put(new_leaf("h:zzz", "y")).await.unwrap();

        use futures::StreamExt;
        let mut stream = t.range_scan(None, Some("h;".to_string()));
        let mut count = 0;
        while let Some(doc) = stream.next().await {
            doc.unwrap();
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
