//! Orphan detection and (optionally) deletion with empty-directory pruning.

use std::collections::HashSet;
use std::path::Path;

use vsync_core::error::SyncError;

use crate::outcome::FileOutcome;

pub struct Reconciler;

impl Reconciler {
    /// `local_paths ∖ remote_paths`, restricted to whatever the caller
    /// already scoped to the sync directories.
    pub fn find_orphans(local_paths: &HashSet<String>, remote_paths: &HashSet<String>) -> Vec<String> {
        let mut orphans: Vec<String> = local_paths.difference(remote_paths).cloned().collect();
        orphans.sort();
        orphans
    }

    /// Delete each orphan under `vault_root`, then prune now-empty parent
    /// directories up to (but not including) `vault_root`.
    pub fn delete_orphans(vault_root: &Path, orphans: &[String]) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(orphans.len());
        for rel in orphans {
            let abs = vault_root.join(rel);
            match std::fs::remove_file(&abs) {
                Ok(()) => {
                    if let Some(parent) = abs.parent() {
                        prune_empty_dirs(vault_root, parent);
                    }
                    outcomes.push(FileOutcome::deleted(rel.clone()));
                }
                Err(e) => outcomes.push(FileOutcome::failed(rel.clone(), SyncError::Io(e))),
            }
        }
        outcomes
    }
}

fn prune_empty_dirs(vault_root: &Path, mut dir: &Path) {
    loop {
        if dir == vault_root {
            return;
        }
        match std::fs::read_dir(dir) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    return;
                }
            }
            Err(_) => return,
        }
        if std::fs::remove_dir(dir).is_err() {
            return;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_orphans_present_locally_but_not_remotely() {
        let local: HashSet<String> = ["a.md", "b/c.md"].iter().map(|s| s.to_string()).collect();
        let remote: HashSet<String> = ["a.md"].iter().map(|s| s.to_string()).collect();
        assert_eq!(Reconciler::find_orphans(&local, &remote), vec!["b/c.md".to_string()]);
    }

    #[test]
    fn deletes_orphan_and_prunes_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a.md"), "keep").unwrap();
        fs::write(dir.path().join("b/c.md"), "orphan").unwrap();

        let outcomes = Reconciler::delete_orphans(dir.path(), &["b/c.md".to_string()]);
        assert_eq!(outcomes.len(), 1);
        assert!(!dir.path().join("b/c.md").exists());
        assert!(!dir.path().join("b").exists());
        assert!(dir.path().join("a.md").exists());
    }

    #[test]
    fn never_prunes_the_vault_root_itself() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only.md"), "orphan").unwrap();

        Reconciler::delete_orphans(dir.path(), &["only.md".to_string()]);
        assert!(dir.path().exists());
    }

    #[test]
    fn stops_pruning_at_a_nonempty_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/keep.md"), "keep").unwrap();
        fs::write(dir.path().join("b/c/orphan.md"), "orphan").unwrap();

        Reconciler::delete_orphans(dir.path(), &["b/c/orphan.md".to_string()]);
        assert!(!dir.path().join("b/c").exists());
        assert!(dir.path().join("b").exists());
        assert!(dir.path().join("b/keep.md").exists());
    }
}
