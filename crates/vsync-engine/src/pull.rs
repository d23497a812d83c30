//! Pull: enumerate remote file documents, batch-fetch referenced chunks,
//! assemble and write each file, preserving the remote mtime.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use filetime::FileTime;
use tokio_util::sync::CancellationToken;

use vsync_core::doc::{FileDoc, LeafDoc};
use vsync_core::error::SyncError;
use vsync_transport::Transport;

use crate::doccodec;
use crate::local_index::LocalFile;
use crate::outcome::FileOutcome;
use crate::push::DEFAULT_CONCURRENCY;
use crate::remote_index::RemoteIndex;

#[derive(Debug, Clone)]
pub struct PullOptions {
    pub dry_run: bool,
    /// Skip files whose local mtime is already >= the remote's. Off by
    /// default — a bare `pull` always refetches every remote document.
    pub changed_only: bool,
    /// Always refetch even when `changed_only` would otherwise skip.
    pub force: bool,
    pub path_prefix: Option<String>,
    /// Bounded parallelism for the chunk-batch fetch pool (§5).
    pub concurrency: usize,
}

impl Default for PullOptions {
    fn default() -> Self {
        PullOptions {
            dry_run: false,
            changed_only: false,
            force: false,
            path_prefix: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

pub struct PullEngine {
    transport: Arc<dyn Transport>,
}

impl PullEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        PullEngine { transport }
    }

    /// Pull every remote file document that passes the change filter and
    /// the optional path-prefix filter, writing into `vault_root`.
    pub async fn pull_all(
        &self,
        vault_root: &Path,
        remote_files: &HashMap<String, FileDoc>,
        locals: &HashMap<String, LocalFile>,
        opts: &PullOptions,
        cancel: &CancellationToken,
    ) -> Vec<FileOutcome> {
        let mut paths: Vec<&String> = remote_files.keys().collect();
        paths.sort();

        let mut candidates = Vec::new();
        for path in paths {
            if let Some(prefix) = &opts.path_prefix {
                if !path.starts_with(prefix.as_str()) {
                    continue;
                }
            }

            let doc = &remote_files[path];
            let local = locals.get(path);

            // Default: pull every remote document, remote is the source of
            // truth for an explicit pull. `changed_only` opts into the
            // mtime skip for faster repeat runs; `force` always overrides it.
            if opts.changed_only && !opts.force {
                if let Some(l) = local {
                    if l.mtime_ms >= doc.mtime {
                        continue;
                    }
                }
            }

            candidates.push(doc.clone());
        }

        if opts.dry_run {
            return candidates
                .into_iter()
                .map(|doc| FileOutcome::skipped(doc.id.clone(), "dry-run"))
                .collect();
        }

        let chunks = match self.fetch_needed_chunks(&candidates, opts.concurrency).await {
            Ok(chunks) => chunks,
            Err(e) => {
                return candidates
                    .into_iter()
                    .map(|doc| FileOutcome::failed(doc.id.clone(), clone_error(&e)))
                    .collect()
            }
        };

        let mut outcomes = Vec::with_capacity(candidates.len());
        for doc in candidates {
            if cancel.is_cancelled() {
                outcomes.push(FileOutcome::skipped(doc.id.clone(), "interrupted"));
                continue;
            }
            outcomes.push(pull_one(vault_root, &doc, &chunks));
        }
        outcomes
    }

    async fn fetch_needed_chunks(
        &self,
        candidates: &[FileDoc],
        concurrency: usize,
    ) -> Result<HashMap<String, LeafDoc>, SyncError> {
        let mut wanted = Vec::new();
        let mut seen = HashSet::new();
        for doc in candidates {
            if let Some(children) = &doc.children {
                for id in children {
                    if seen.insert(id.clone()) {
                        wanted.push(id.clone());
                    }
                }
            }
        }
        RemoteIndex::fetch_chunks_concurrent(self.transport.clone(), &wanted, concurrency).await
    }
}

fn pull_one(vault_root: &Path, doc: &FileDoc, chunks: &HashMap<String, LeafDoc>) -> FileOutcome {
    let payload = match doccodec::assemble_pull_payload(doc, chunks) {
        Ok(p) => p,
        Err(e) => return FileOutcome::failed(&doc.id, e),
    };

    let decoded = doccodec::decode_wire_payload(&payload);
    let abs_path = vault_root.join(&doc.path);

    if let Some(parent) = abs_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return FileOutcome::failed(&doc.id, SyncError::Io(e));
        }
    }

    let tmp_path = abs_path.with_extension("vsync_tmp");
    if let Err(e) = std::fs::write(&tmp_path, &decoded.bytes) {
        return FileOutcome::failed(&doc.id, SyncError::Io(e));
    }
    if let Err(e) = std::fs::rename(&tmp_path, &abs_path) {
        return FileOutcome::failed(&doc.id, SyncError::Io(e));
    }

    let seconds = doc.mtime.div_euclid(1000);
    let nanos = (doc.mtime.rem_euclid(1000) * 1_000_000) as u32;
    let mtime = FileTime::from_unix_time(seconds, nanos);
    if let Err(e) = filetime::set_file_mtime(&abs_path, mtime) {
        return FileOutcome::failed(&doc.id, SyncError::Io(e));
    }

    FileOutcome::pulled(&doc.id, decoded.bytes.len() as u64)
}

/// `SyncError` doesn't derive `Clone` (it wraps `anyhow::Error` and
/// `std::io::Error`, neither of which are `Clone`); a fetch failure shared
/// across every candidate file is re-rendered as a fresh transport error per
/// file instead.
fn clone_error(e: &SyncError) -> SyncError {
    SyncError::Transport {
        status: 0,
        body_excerpt: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn leaf(id: &str, data: &str) -> LeafDoc {
        LeafDoc {
            id: id.to_string(),
            data: data.to_string(),
            rev: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn writes_file_and_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let doc = FileDoc::new_chunked("notes/a.md", vec!["h:1".into()], 5, 0, 1_700_000_000_000);
        let mut chunks = HashMap::new();
        chunks.insert("h:1".to_string(), leaf("h:1", "hello"));

        let outcome = pull_one(dir.path(), &doc, &chunks);
        assert!(matches!(outcome, FileOutcome::Pulled { bytes: 5, .. }));

        let written = std::fs::read_to_string(dir.path().join("notes/a.md")).unwrap();
        assert_eq!(written, "hello");
    }

    #[test]
    fn missing_chunk_fails_without_partial_write() {
        let dir = tempfile::tempdir().unwrap();
        let doc = FileDoc::new_chunked("a.md", vec!["h:missing".into()], 0, 0, 0);
        let outcome = pull_one(dir.path(), &doc, &HashMap::new());
        assert!(outcome.is_failed());
        assert!(!dir.path().join("a.md").exists());
    }
}
