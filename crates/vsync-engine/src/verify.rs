//! Verify: re-chunk local files that already exist remotely and compare the
//! resulting chunk-id sequence against what the remote document records.
//!
//! This is the canonical signal that the chunker has drifted from the
//! reference (livesync-commonlib's `splitPiecesRabinKarp`) — a mismatch
//! means chunk dedup against the existing plugin ecosystem will degrade,
//! not that the file failed to sync. It never mutates anything, local or
//! remote.

use std::collections::HashMap;

use vsync_core::doc::FileDoc;
use vsync_core::error::SyncError;

use crate::doccodec;
use crate::local_index::LocalFile;

/// Result of comparing one local file's re-chunked ids against the remote
/// document's recorded `children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Re-chunking reproduced exactly the remote's `children` list.
    Match { path: String },
    /// Re-chunking produced a different chunk-id sequence.
    Mismatch {
        path: String,
        local_children: Vec<String>,
        remote_children: Vec<String>,
    },
    /// The local file isn't valid UTF-8 text, or the remote document has no
    /// `children` to compare against (it was transported inline).
    Skipped { path: String, reason: String },
}

impl VerifyOutcome {
    pub fn path(&self) -> &str {
        match self {
            VerifyOutcome::Match { path }
            | VerifyOutcome::Mismatch { path, .. }
            | VerifyOutcome::Skipped { path, .. } => path,
        }
    }
}

/// Tally of a verify run's outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub matched: usize,
    pub mismatched: usize,
    pub skipped: usize,
}

impl VerifyReport {
    pub fn tally(outcomes: &[VerifyOutcome]) -> Self {
        let mut r = VerifyReport::default();
        for o in outcomes {
            match o {
                VerifyOutcome::Match { .. } => r.matched += 1,
                VerifyOutcome::Mismatch { .. } => r.mismatched += 1,
                VerifyOutcome::Skipped { .. } => r.skipped += 1,
            }
        }
        r
    }
}

pub struct VerifyEngine;

impl VerifyEngine {
    /// Re-chunk up to `count` local files that exist remotely (sorted by
    /// path for determinism) and compare `children` equality.
    pub fn verify(
        locals: &HashMap<String, LocalFile>,
        remote_files: &HashMap<String, FileDoc>,
        count: usize,
        path_prefix: Option<&str>,
    ) -> Vec<VerifyOutcome> {
        let mut paths: Vec<&String> = locals
            .keys()
            .filter(|p| remote_files.contains_key(p.as_str()))
            .filter(|p| path_prefix.map_or(true, |prefix| p.starts_with(prefix)))
            .collect();
        paths.sort();
        paths.truncate(count);

        paths
            .into_iter()
            .map(|path| verify_one(path, &locals[path], &remote_files[path]))
            .collect()
    }
}

fn verify_one(path: &str, local: &LocalFile, remote: &FileDoc) -> VerifyOutcome {
    let Some(remote_children) = &remote.children else {
        return VerifyOutcome::Skipped {
            path: path.to_string(),
            reason: "remote document has no children (transported inline)".to_string(),
        };
    };

    let bytes = match std::fs::read(&local.abs_path) {
        Ok(b) => b,
        Err(e) => {
            return VerifyOutcome::Skipped {
                path: path.to_string(),
                reason: format!("reading local file: {e}"),
            }
        }
    };

    let text = match doccodec::prepare_push_payload(&bytes) {
        Ok(t) => t,
        Err(SyncError::Encoding(msg)) => {
            return VerifyOutcome::Skipped {
                path: path.to_string(),
                reason: msg,
            }
        }
        Err(e) => {
            return VerifyOutcome::Skipped {
                path: path.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let local_children: Vec<String> = vsync_chunk::chunk_payload(text.as_bytes())
        .into_iter()
        .map(|c| c.id)
        .collect();

    if &local_children == remote_children {
        VerifyOutcome::Match {
            path: path.to_string(),
        }
    } else {
        VerifyOutcome::Mismatch {
            path: path.to_string(),
            local_children,
            remote_children: remote_children.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_file(dir: &std::path::Path, rel: &str, content: &str) -> LocalFile {
        let abs = dir.join(rel);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&abs, content).unwrap();
        LocalFile {
            rel_path: rel.to_string(),
            abs_path: abs,
            size: content.len() as u64,
            ctime_ms: 0,
            mtime_ms: 0,
        }
    }

    #[test]
    fn matches_when_rechunk_reproduces_remote_children() {
        let dir = tempfile::tempdir().unwrap();
        let content = "the quick brown fox jumps over the lazy dog\n".repeat(20);
        let local = local_file(dir.path(), "a.md", &content);

        let children: Vec<String> = vsync_chunk::chunk_payload(content.as_bytes())
            .into_iter()
            .map(|c| c.id)
            .collect();
        let remote = FileDoc::new_chunked("a.md", children, content.len() as u64, 0, 0);

        let mut locals = HashMap::new();
        locals.insert("a.md".to_string(), local);
        let mut remotes = HashMap::new();
        remotes.insert("a.md".to_string(), remote);

        let outcomes = VerifyEngine::verify(&locals, &remotes, 10, None);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], VerifyOutcome::Match { .. }));
    }

    #[test]
    fn mismatch_when_remote_children_diverge() {
        let dir = tempfile::tempdir().unwrap();
        let content = "hello world\n".repeat(5);
        let local = local_file(dir.path(), "a.md", &content);
        let remote = FileDoc::new_chunked("a.md", vec!["h:bogus".to_string()], 5, 0, 0);

        let mut locals = HashMap::new();
        locals.insert("a.md".to_string(), local);
        let mut remotes = HashMap::new();
        remotes.insert("a.md".to_string(), remote);

        let outcomes = VerifyEngine::verify(&locals, &remotes, 10, None);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], VerifyOutcome::Mismatch { .. }));
    }

    #[test]
    fn skips_inline_remote_documents() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(dir.path(), "a.md", "hi");
        let mut remote = FileDoc::new_chunked("a.md", vec![], 2, 0, 0);
        remote.children = None;
        remote.data = Some("hi".to_string());

        let mut locals = HashMap::new();
        locals.insert("a.md".to_string(), local);
        let mut remotes = HashMap::new();
        remotes.insert("a.md".to_string(), remote);

        let outcomes = VerifyEngine::verify(&locals, &remotes, 10, None);
        assert!(matches!(outcomes[0], VerifyOutcome::Skipped { .. }));
    }

    #[test]
    fn respects_count_limit_and_path_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut locals = HashMap::new();
        let mut remotes = HashMap::new();
        for name in ["articles/a.md", "articles/b.md", "notes/c.md"] {
            let content = format!("content of {name}");
            let local = local_file(dir.path(), name, &content);
            let children: Vec<String> = vsync_chunk::chunk_payload(content.as_bytes())
                .into_iter()
                .map(|c| c.id)
                .collect();
            remotes.insert(name.to_string(), FileDoc::new_chunked(name, children, content.len() as u64, 0, 0));
            locals.insert(name.to_string(), local);
        }

        let outcomes = VerifyEngine::verify(&locals, &remotes, 10, Some("articles/"));
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.path().starts_with("articles/")));

        let limited = VerifyEngine::verify(&locals, &remotes, 1, None);
        assert_eq!(limited.len(), 1);
    }
}
