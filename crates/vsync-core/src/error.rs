use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can terminate a run outright.
///
/// Per-file failures are *not* represented here — engines translate those
/// into a `FileOutcome::Failed` value and keep going. Only configuration
/// and interrupt conditions propagate this far.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error ({status}): {body_excerpt}")]
    Transport { status: u16, body_excerpt: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("missing chunk: {0}")]
    MissingChunk(String),

    #[error("document conflict: {0}")]
    Conflict(String),

    #[error("interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn transport(status: u16, body: &str) -> Self {
        let body_excerpt: String = body.chars().take(200).collect();
        SyncError::Transport {
            status,
            body_excerpt,
        }
    }
}
