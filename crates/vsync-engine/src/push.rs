//! Push: for each local file that passes the change filter, chunk it,
//! upload missing chunks in parallel, then PUT the file-metadata document
//! with a single conflict-retry.
//!
//! Mtime is the entire sync-state vocabulary here (Open Question 2,
//! resolved as accepted policy, not "fixed" — see DESIGN.md): a file is
//! considered changed purely by comparing local and remote `mtime`, with no
//! vector clock or content-hash fallback. Concurrent edits to the same path
//! on both sides are resolved last-writer-wins by mtime; only the
//! document-level `_rev` race is retried.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use vsync_core::doc::{new_leaf, FileDoc, RemoteDoc};
use vsync_core::error::SyncError;
use vsync_transport::{PutOutcome, Transport};

use crate::doccodec;
use crate::local_index::LocalFile;
use crate::outcome::FileOutcome;

/// Default bounded parallelism for chunk-level uploads within a single file.
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub dry_run: bool,
    pub force: bool,
    pub path_prefix: Option<String>,
    pub concurrency: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            dry_run: false,
            force: false,
            path_prefix: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

pub struct PushEngine {
    transport: Arc<dyn Transport>,
}

impl PushEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        PushEngine { transport }
    }

    /// Push every local file that passes the change filter and the
    /// optional path-prefix filter, stopping between files if `cancel` has
    /// fired.
    pub async fn push_all(
        &self,
        locals: &HashMap<String, LocalFile>,
        remote_files: &HashMap<String, FileDoc>,
        opts: &PushOptions,
        cancel: &CancellationToken,
    ) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(locals.len());
        let mut paths: Vec<&String> = locals.keys().collect();
        paths.sort();

        for path in paths {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(prefix) = &opts.path_prefix {
                if !path.starts_with(prefix.as_str()) {
                    continue;
                }
            }

            let local = &locals[path];
            let remote = remote_files.get(path);

            if !opts.force {
                if let Some(r) = remote {
                    if r.mtime >= local.mtime_ms {
                        outcomes.push(FileOutcome::skipped(path, "remote is up to date"));
                        continue;
                    }
                }
            }

            if opts.dry_run {
                outcomes.push(FileOutcome::skipped(path, "dry-run"));
                continue;
            }

            let rev = remote.and_then(|r| r.rev.clone());
            outcomes.push(self.push_file(local, rev, opts.concurrency, cancel).await);
        }

        outcomes
    }

    /// Upload sequence: chunk, upload missing chunks (bounded parallelism),
    /// PUT metadata with one retry on conflict. Chunks are always uploaded
    /// before the metadata document references them, so a crash mid-push
    /// never leaves a dangling reference (§3's chunk invariant).
    pub async fn push_file(
        &self,
        local: &LocalFile,
        existing_rev: Option<String>,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> FileOutcome {
        let bytes = match std::fs::read(&local.abs_path) {
            Ok(b) => b,
            Err(e) => return FileOutcome::failed(&local.rel_path, SyncError::Io(e)),
        };

        let text = match doccodec::prepare_push_payload(&bytes) {
            Ok(t) => t,
            Err(e) => return FileOutcome::skipped(&local.rel_path, e.to_string()),
        };

        let chunks = vsync_chunk::chunk_payload(text.as_bytes());

        if cancel.is_cancelled() {
            return FileOutcome::skipped(&local.rel_path, "interrupted");
        }

        if let Err(e) = self.upload_missing_chunks(&chunks, concurrency).await {
            return FileOutcome::failed(&local.rel_path, e);
        }

        let children: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let mut doc = FileDoc::new_chunked(&local.rel_path, children, text.len() as u64, local.ctime_ms, local.mtime_ms);
        doc.rev = existing_rev;

        match self.transport.put(RemoteDoc::FileChunked(doc.clone())).await {
            Ok(PutOutcome::Ok(rev)) => FileOutcome::pushed(&local.rel_path, chunks.len(), rev),
            Ok(PutOutcome::Conflict) => self.retry_after_conflict(doc, chunks.len()).await,
            Err(e) => FileOutcome::failed(&local.rel_path, e),
        }
    }

    async fn retry_after_conflict(&self, mut doc: FileDoc, chunks_uploaded: usize) -> FileOutcome {
        let path = doc.id.clone();
        let current = match self.transport.get(&path).await {
            Ok(Some(RemoteDoc::FileChunked(existing) | RemoteDoc::FileInline(existing))) => existing,
            Ok(_) => {
                return FileOutcome::failed(
                    &path,
                    SyncError::Conflict(format!("{path}: document vanished during conflict retry")),
                )
            }
            Err(e) => return FileOutcome::failed(&path, e),
        };

        doc.rev = current.rev;
        match self.transport.put(RemoteDoc::FileChunked(doc)).await {
            Ok(PutOutcome::Ok(rev)) => FileOutcome::pushed(&path, chunks_uploaded, rev),
            Ok(PutOutcome::Conflict) => {
                FileOutcome::failed(&path, SyncError::Conflict(format!("{path}: conflict persisted after retry")))
            }
            Err(e) => FileOutcome::failed(&path, e),
        }
    }

    /// HEAD each chunk; PUT only the ones missing. A 409 on PUT counts as
    /// success — chunks are content-addressed, so "already there" and "we
    /// just wrote it" are equivalent (§4.6).
    async fn upload_missing_chunks(
        &self,
        chunks: &[vsync_chunk::Chunk],
        concurrency: usize,
    ) -> Result<(), SyncError> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for chunk in chunks {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            let transport = self.transport.clone();
            let id = chunk.id.clone();
            let data = chunk.data.clone();
            tasks.spawn(async move {
                let _permit = permit;
                upload_one_chunk(transport, id, data).await
            });
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(join_err) => {
                    return Err(SyncError::Other(anyhow::anyhow!(
                        "chunk upload task panicked: {join_err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

async fn upload_one_chunk(transport: Arc<dyn Transport>, id: String, data: Vec<u8>) -> Result<(), SyncError> {
    if transport.head(&id).await? {
        return Ok(());
    }

    let text = String::from_utf8(data).expect("chunk boundaries never split a UTF-8 codepoint");
    match transport.put(new_leaf(&id, &text)).await? {
        PutOutcome::Ok(_) | PutOutcome::Conflict => Ok(()),
    }
}
