//! Enumerate remote file-metadata documents and batch-fetch their chunks.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use vsync_core::doc::{trim_leading_slash, LeafDoc, RemoteDoc, LEAF_PREFIX};
use vsync_core::error::{SyncError, SyncResult};
use vsync_transport::Transport;

/// Chunk documents are fetched `bulk_get` style in pages no larger than this
/// (§4.4's "batch chunk fetch").
pub const CHUNK_BATCH_SIZE: usize = 500;

/// The key one character past `"h:"` in byte order — the other end of the
/// two-scan split that skips the chunk-id keyspace (§4.4, Open Question 3).
const LEAF_PREFIX_UPPER_BOUND: &str = "h;";

/// Enumerates file-metadata documents, skipping chunk ("leaf") and design
/// documents.
pub struct RemoteIndex;

impl RemoteIndex {
    /// Two range scans collectively covering every key except the `h:`
    /// chunk-id keyspace, keyed by vault-relative path (leading `/` trimmed).
    pub async fn scan(transport: &dyn Transport) -> SyncResult<HashMap<String, vsync_core::doc::FileDoc>> {
        let mut out = HashMap::new();

        collect_scan(transport, None, Some(LEAF_PREFIX.to_string()), &mut out).await?;
        collect_scan(transport, Some(LEAF_PREFIX_UPPER_BOUND.to_string()), None, &mut out).await?;

        Ok(out)
    }

    /// Fetch every chunk in `ids`, paged at [`CHUNK_BATCH_SIZE`] per request.
    /// Ids with no corresponding document are simply absent from the result;
    /// callers surface that as a per-file [`vsync_core::SyncError::MissingChunk`].
    pub async fn fetch_chunks(
        transport: &dyn Transport,
        ids: &[String],
    ) -> SyncResult<HashMap<String, LeafDoc>> {
        let mut out = HashMap::new();
        for page in ids.chunks(CHUNK_BATCH_SIZE) {
            let fetched = transport.bulk_get(page).await?;
            for (id, doc) in fetched {
                if let RemoteDoc::Leaf(leaf) = doc {
                    out.insert(id, leaf);
                }
            }
        }
        Ok(out)
    }

    /// Same as [`Self::fetch_chunks`], but pages are requested concurrently
    /// through a bounded worker pool — the pull-side counterpart of
    /// [`crate::push::PushEngine`]'s chunk-upload pool (§5's "bounded
    /// worker pool for chunk-level I/O").
    pub async fn fetch_chunks_concurrent(
        transport: Arc<dyn Transport>,
        ids: &[String],
        concurrency: usize,
    ) -> SyncResult<HashMap<String, LeafDoc>> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for page in ids.chunks(CHUNK_BATCH_SIZE) {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore is never closed");
            let transport = transport.clone();
            let page = page.to_vec();
            tasks.spawn(async move {
                let _permit = permit;
                transport.bulk_get(&page).await
            });
        }

        let mut out = HashMap::new();
        while let Some(result) = tasks.join_next().await {
            let fetched = match result {
                Ok(Ok(fetched)) => fetched,
                Ok(Err(e)) => return Err(e),
                Err(join_err) => {
                    return Err(SyncError::Other(anyhow::anyhow!("chunk fetch task panicked: {join_err}")))
                }
            };
            for (id, doc) in fetched {
                if let RemoteDoc::Leaf(leaf) = doc {
                    out.insert(id, leaf);
                }
            }
        }
        Ok(out)
    }
}

async fn collect_scan(
    transport: &dyn Transport,
    startkey: Option<String>,
    endkey: Option<String>,
    out: &mut HashMap<String, vsync_core::doc::FileDoc>,
) -> SyncResult<()> {
    let mut stream = transport.range_scan(startkey, endkey);
    while let Some(doc) = stream.next().await {
        let doc = doc?;
        if let Some((path, file)) = as_file_entry(doc) {
            out.insert(path, file);
        }
    }
    Ok(())
}

/// Keep only documents that are file documents (not chunks, not design
/// docs), keyed by their trimmed path.
fn as_file_entry(doc: RemoteDoc) -> Option<(String, vsync_core::doc::FileDoc)> {
    match doc {
        RemoteDoc::FileInline(f) | RemoteDoc::FileChunked(f) => {
            if f.id.starts_with(LEAF_PREFIX) || f.id.starts_with('_') {
                return None;
            }
            let path = trim_leading_slash(&f.id).to_string();
            Some((path, f))
        }
        RemoteDoc::Leaf(_) | RemoteDoc::Unknown(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsync_core::doc::FileDoc;

    #[test]
    fn accepts_inline_and_chunked_file_docs() {
        let inline = RemoteDoc::FileInline(FileDoc::new_chunked("a.md", vec![], 0, 0, 0));
        assert!(as_file_entry(inline).is_some());

        let chunked = RemoteDoc::FileChunked(FileDoc::new_chunked("b.md", vec!["h:1".into()], 1, 0, 0));
        assert!(as_file_entry(chunked).is_some());
    }

    #[test]
    fn rejects_leaf_and_design_docs() {
        let leaf = RemoteDoc::Leaf(vsync_core::doc::LeafDoc {
            id: "h:abc".into(),
            data: "x".into(),
            rev: None,
            extra: serde_json::Map::new(),
        });
        assert!(as_file_entry(leaf).is_none());

        let mut design = FileDoc::new_chunked("_design/views", vec![], 0, 0, 0);
        design.id = "_design/views".to_string();
        assert!(as_file_entry(RemoteDoc::FileChunked(design)).is_none());
    }

    #[test]
    fn trims_leading_slash_from_path() {
        let doc = RemoteDoc::FileInline(FileDoc::new_chunked("/a.md", vec![], 0, 0, 0));
        let (path, _) = as_file_entry(doc).unwrap();
        assert_eq!(path, "a.md");
    }
}
