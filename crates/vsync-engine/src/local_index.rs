//! Walk the vault's sync directories and record what's on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use vsync_core::doc::LEAF_PREFIX;
use vsync_core::error::{SyncError, SyncResult};

/// Default substring-match exclude rules: VCS metadata, OS artifacts, and
/// editor/plugin internals that should never be treated as vault content.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".obsidian/workspace",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    ".trash",
];

/// A single file as seen on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Vault-relative path, forward slashes, no leading slash.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub ctime_ms: i64,
    pub mtime_ms: i64,
}

/// Walks a vault's sync directories and builds the local side of the join.
pub struct LocalIndex;

impl LocalIndex {
    /// Walk `roots` (each relative to `vault_root`) and return every regular
    /// file that survives the exclude rules, keyed by vault-relative path.
    ///
    /// Fails fast if any path begins with exactly the chunk-id prefix
    /// (`"h:"`) — such a path would be invisible to `RemoteIndex`'s range
    /// scans (Open Question 3; see DESIGN.md), so this is treated as a
    /// configuration error rather than a silently-dropped file.
    pub fn scan(
        vault_root: &Path,
        roots: &[PathBuf],
        excludes: &[String],
    ) -> SyncResult<HashMap<String, LocalFile>> {
        let mut out = HashMap::new();

        for root in roots {
            let abs_root = vault_root.join(root);
            if !abs_root.exists() {
                continue;
            }

            for entry in WalkDir::new(&abs_root).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }

                let abs_path = entry.path().to_path_buf();
                let rel_path = to_rel_path(vault_root, &abs_path);

                if is_excluded(&rel_path, excludes) {
                    continue;
                }
                if rel_path.starts_with(LEAF_PREFIX) {
                    return Err(SyncError::Config(format!(
                        "local path '{rel_path}' begins with the reserved chunk-id prefix '{LEAF_PREFIX}' \
                         and would be invisible to remote enumeration; rename it or exclude its directory"
                    )));
                }

                let meta = entry
                    .metadata()
                    .map_err(|e| SyncError::Other(anyhow::anyhow!("stat {}: {e}", entry.path().display())))?;
                let (ctime_ms, mtime_ms) = timestamps_ms(&meta);

                out.insert(
                    rel_path.clone(),
                    LocalFile {
                        rel_path,
                        abs_path,
                        size: meta.len(),
                        ctime_ms,
                        mtime_ms,
                    },
                );
            }
        }

        Ok(out)
    }
}

fn is_excluded(rel_path: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|rule| rel_path.contains(rule.as_str()))
}

fn to_rel_path(vault_root: &Path, abs_path: &Path) -> String {
    let rel = abs_path.strip_prefix(vault_root).unwrap_or(abs_path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn timestamps_ms(meta: &std::fs::Metadata) -> (i64, i64) {
    use std::os::unix::fs::MetadataExt;
    let ctime_ms = meta.ctime() * 1000 + meta.ctime_nsec() / 1_000_000;
    let mtime_ms = meta.mtime() * 1000 + meta.mtime_nsec() / 1_000_000;
    (ctime_ms, mtime_ms)
}

#[cfg(not(unix))]
fn timestamps_ms(meta: &std::fs::Metadata) -> (i64, i64) {
    use std::time::UNIX_EPOCH;
    let mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    (mtime_ms, mtime_ms)
}
