//! vsync-core: shared document model, configuration, and error types.

pub mod config;
pub mod doc;
pub mod error;

pub use config::Config;
pub use error::{SyncError, SyncResult};
