//! `reqwest`-backed implementation of the [`crate::Transport`] trait against
//! a CouchDB-compatible remote store.
//!
//! Wire details this module owns: HTTP Basic auth on every request, JSON
//! bodies, and the "JSON-encode then URL-encode" rule for range-scan key
//! bounds (`Url::query_pairs_mut` percent-encodes whatever we feed it, so
//! quoting the key as a JSON string first is the only part we have to do by
//! hand). Doc ids that land in the URL *path* (not a query string) go
//! through `Url::path_segments_mut`, which percent-encodes reserved
//! characters — including the `/` that turns up in vault-relative paths —
//! for us.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use vsync_core::doc::{decode_doc, encode_doc, RemoteDoc};
use vsync_core::error::{SyncError, SyncResult};
use vsync_core::Config;

use crate::{doc_id_of, DocStream, PutOutcome, Transport};

/// Default timeout for single-document operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for `bulk_get`/`range_scan` — responses can carry hundreds of chunks.
pub const BULK_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout for `HEAD` existence probes.
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// A [`Transport`] backed by a real HTTP connection to the remote store.
pub struct HttpTransport {
    client: Client,
    db_url: Url,
    user: String,
    password: String,
}

impl HttpTransport {
    /// Build a transport from resolved configuration.
    pub fn new(config: &Config) -> SyncResult<Self> {
        let base = Url::parse(&config.couchdb_uri)
            .map_err(|e| SyncError::Config(format!("invalid COUCHDB_URI: {e}")))?;

        let mut db_url = base.clone();
        {
            let mut segments = db_url
                .path_segments_mut()
                .map_err(|_| SyncError::Config("COUCHDB_URI cannot be a base URL".to_string()))?;
            segments.pop_if_empty();
            segments.push(&config.couchdb_db);
            segments.push(""); // trailing slash so relative joins behave
        }

        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::Config(format!("building HTTP client: {e}")))?;

        tracing::debug!(db_url = %db_url, user = %config.couchdb_user, "http transport configured");

        Ok(HttpTransport {
            client,
            db_url,
            user: config.couchdb_user.clone(),
            password: config.couchdb_password.clone(),
        })
    }

    fn doc_url(&self, doc_id: &str) -> SyncResult<Url> {
        let mut url = self.db_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config("database URL cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push(doc_id);
        Ok(url)
    }

    fn all_docs_url(&self) -> Url {
        let mut url = self.db_url.clone();
        // db_url always has a trailing empty segment; path_segments_mut on a
        // non-base-URL can't happen here since we built it from an http(s) URL.
        url.path_segments_mut()
            .expect("db_url is always a base URL")
            .pop_if_empty()
            .push("_all_docs");
        url
    }

    async fn read_error_body(resp: reqwest::Response) -> String {
        resp.text().await.unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, doc_id: &str) -> SyncResult<Option<RemoteDoc>> {
        let url = self.doc_url(doc_id)?;
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| SyncError::transport(0, &e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| SyncError::transport(status.as_u16(), &e.to_string()))?;
                Ok(decode_doc(body))
            }
            status => {
                let body = Self::read_error_body(resp).await;
                Err(SyncError::transport(status.as_u16(), &body))
            }
        }
    }

    async fn head(&self, doc_id: &str) -> SyncResult<bool> {
        let url = self.doc_url(doc_id)?;
        let resp = self
            .client
            .head(url)
            .basic_auth(&self.user, Some(&self.password))
            .timeout(HEAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| SyncError::transport(0, &e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(SyncError::transport(status.as_u16(), "HEAD request failed")),
        }
    }

    async fn put(&self, doc: RemoteDoc) -> SyncResult<PutOutcome> {
        let id = doc_id_of(&doc);
        let url = self.doc_url(&id)?;
        let body = encode_doc(&doc);

        let resp = self
            .client
            .put(url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| SyncError::transport(0, &e.to_string()))?;

        match resp.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| SyncError::transport(status.as_u16(), &e.to_string()))?;
                let rev = body
                    .get("rev")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(PutOutcome::Ok(rev))
            }
            status => {
                let body = Self::read_error_body(resp).await;
                Err(SyncError::transport(status.as_u16(), &body))
            }
        }
    }

    async fn bulk_get(&self, doc_ids: &[String]) -> SyncResult<HashMap<String, RemoteDoc>> {
        if doc_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut url = self.all_docs_url();
        url.query_pairs_mut().append_pair("include_docs", "true");

        let body = serde_json::json!({ "keys": doc_ids });
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .timeout(BULK_TIMEOUT)
            .send()
            .await
            .map_err(|e| SyncError::transport(0, &e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = Self::read_error_body(resp).await;
            return Err(SyncError::transport(status.as_u16(), &body));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| SyncError::transport(status.as_u16(), &e.to_string()))?;

        Ok(rows_to_docs(&parsed))
    }

    fn range_scan<'a>(&'a self, startkey: Option<String>, endkey: Option<String>) -> DocStream<'a> {
        Box::pin(async_stream::try_stream! {
            let mut url = self.all_docs_url();
            {
                let mut qp = url.query_pairs_mut();
                qp.append_pair("include_docs", "true");
                if let Some(sk) = &startkey {
                    let quoted = serde_json::to_string(sk).expect("string always serializes");
                    qp.append_pair("startkey", &quoted);
                }
                if let Some(ek) = &endkey {
                    let quoted = serde_json::to_string(ek).expect("string always serializes");
                    qp.append_pair("endkey", &quoted);
                }
            }

            let resp = self
                .client
                .get(url)
                .basic_auth(&self.user, Some(&self.password))
                .timeout(DEFAULT_TIMEOUT)
                .send()
                .await
                .map_err(|e| SyncError::transport(0, &e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = Self::read_error_body(resp).await;
                Err(SyncError::transport(status.as_u16(), &body))?;
            }

            let parsed: Value = resp
                .json()
                .await
                .map_err(|e| SyncError::transport(status.as_u16(), &e.to_string()))?;

            for (_, doc) in rows_to_docs(&parsed) {
                yield doc;
            }
        })
    }
}

fn rows_to_docs(parsed: &Value) -> HashMap<String, RemoteDoc> {
    let mut out = HashMap::new();
    let Some(rows) = parsed.get("rows").and_then(|v| v.as_array()) else {
        return out;
    };
    for row in rows {
        let Some(doc_val) = row.get("doc") else { continue };
        if doc_val.is_null() {
            continue;
        }
        if let Some(doc) = decode_doc(doc_val.clone()) {
            out.insert(doc_id_of(&doc), doc);
        }
    }
    out
}
