//! Orchestration: change detection, chunk transport scheduling, and
//! reconciliation between a local vault and the remote document store.
//!
//! Each module owns one stage of a run; [`outcome::FileOutcome`] is the
//! common currency they hand back so a failure on one file never aborts the
//! rest (see `doc comment on `vsync_core::SyncError`).

pub mod doccodec;
pub mod local_index;
pub mod outcome;
pub mod pull;
pub mod push;
pub mod reconciler;
pub mod remote_index;
pub mod verify;

/// An in-memory [`vsync_transport::Transport`] double, for this crate's own
/// tests and for integration tests under `tests/`. Not part of the stable
/// public API.
#[doc(hidden)]
pub mod tests_support;

pub use local_index::{LocalFile, LocalIndex};
pub use outcome::{FileOutcome, Summary};
pub use pull::{PullEngine, PullOptions};
pub use push::{PushEngine, PushOptions};
pub use reconciler::Reconciler;
pub use remote_index::RemoteIndex;
pub use verify::{VerifyEngine, VerifyOutcome, VerifyReport};
