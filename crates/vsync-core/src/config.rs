//! Process configuration, loaded once at startup and threaded explicitly.
//!
//! Recognized variables (env, or a `.env` file next to the executable):
//!   COUCHDB_URI      — base URL of the remote store (required)
//!   COUCHDB_USER     — HTTP Basic user (default "admin")
//!   COUCHDB_PASSWORD — HTTP Basic password (required)
//!   COUCHDB_DB       — database name (default "obsidian")
//!
//! Values already present in the process environment are never overwritten
//! by `.env` — `dotenvy::dotenv()` only fills in variables that are unset.

use crate::error::{SyncError, SyncResult};

const DEFAULT_USER: &str = "admin";
const DEFAULT_DB: &str = "obsidian";

/// Fully resolved configuration for a single run.
#[derive(Debug, Clone)]
pub struct Config {
    pub couchdb_uri: String,
    pub couchdb_user: String,
    pub couchdb_password: String,
    pub couchdb_db: String,
}

impl Config {
    /// Load configuration from the process environment, falling back to a
    /// `.env` file (existing environment variables win) and then built-in
    /// defaults for the optional fields.
    ///
    /// Fails fast with [`SyncError::Config`] if a required variable is
    /// missing — this must happen before any network I/O.
    pub fn load() -> SyncResult<Self> {
        // dotenvy::dotenv() is a no-op (Ok) if no .env file is found; it
        // never overwrites variables already set in the environment.
        let _ = dotenvy::dotenv();

        let couchdb_uri = required_env("COUCHDB_URI")?;
        let couchdb_password = required_env("COUCHDB_PASSWORD")?;
        let couchdb_user = optional_env("COUCHDB_USER", DEFAULT_USER);
        let couchdb_db = optional_env("COUCHDB_DB", DEFAULT_DB);

        Ok(Config {
            couchdb_uri,
            couchdb_user,
            couchdb_password,
            couchdb_db,
        })
    }

    /// Construct a config directly, bypassing environment lookup. Used by
    /// tests and by callers embedding this crate in a larger tool.
    pub fn new(
        couchdb_uri: impl Into<String>,
        couchdb_user: impl Into<String>,
        couchdb_password: impl Into<String>,
        couchdb_db: impl Into<String>,
    ) -> Self {
        Config {
            couchdb_uri: couchdb_uri.into(),
            couchdb_user: couchdb_user.into(),
            couchdb_password: couchdb_password.into(),
            couchdb_db: couchdb_db.into(),
        }
    }
}

fn required_env(key: &str) -> SyncResult<String> {
    std::env::var(key)
        .map_err(|_| SyncError::Config(format!("missing required environment variable {key}")))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
