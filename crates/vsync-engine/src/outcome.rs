//! Per-file results. Engines accumulate these instead of raising — only
//! configuration errors and interrupt propagate out of a run (§7).

use vsync_core::SyncError;

/// What happened to a single vault-relative path during a run.
#[derive(Debug)]
pub enum FileOutcome {
    /// Pushed to the remote (or its chunks/metadata confirmed already current).
    Pushed {
        path: String,
        chunks_uploaded: usize,
        rev: String,
    },
    /// Written to the local vault.
    Pulled { path: String, bytes: u64 },
    /// Removed as an orphan.
    Deleted { path: String },
    /// Left untouched — not an error.
    Skipped { path: String, reason: String },
    /// Did not complete; the file is untouched on the side that failed.
    Failed { path: String, error: SyncError },
}

impl FileOutcome {
    pub fn pushed(path: impl Into<String>, chunks_uploaded: usize, rev: impl Into<String>) -> Self {
        FileOutcome::Pushed {
            path: path.into(),
            chunks_uploaded,
            rev: rev.into(),
        }
    }

    pub fn pulled(path: impl Into<String>, bytes: u64) -> Self {
        FileOutcome::Pulled {
            path: path.into(),
            bytes,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        FileOutcome::Deleted { path: path.into() }
    }

    pub fn skipped(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FileOutcome::Skipped {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(path: impl Into<String>, error: SyncError) -> Self {
        FileOutcome::Failed {
            path: path.into(),
            error,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }

    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Pushed { path, .. }
            | FileOutcome::Pulled { path, .. }
            | FileOutcome::Deleted { path }
            | FileOutcome::Skipped { path, .. }
            | FileOutcome::Failed { path, .. } => path,
        }
    }
}

/// Tally of outcomes for a run's summary line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub pushed: usize,
    pub pulled: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn tally(outcomes: &[FileOutcome]) -> Self {
        let mut s = Summary::default();
        for o in outcomes {
            match o {
                FileOutcome::Pushed { .. } => s.pushed += 1,
                FileOutcome::Pulled { .. } => s.pulled += 1,
                FileOutcome::Deleted { .. } => s.deleted += 1,
                FileOutcome::Skipped { .. } => s.skipped += 1,
                FileOutcome::Failed { .. } => s.failed += 1,
            }
        }
        s
    }
}
