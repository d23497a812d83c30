//! The document model shared with the remote store.
//!
//! The remote store (CouchDB-family) has no static schema — any JSON object
//! is a valid document. Rather than pass `serde_json::Value` around
//! everywhere, we decode strictly into one of a small set of shapes this
//! tool actually interprets, and keep a raw-map escape hatch (`RawDoc` /
//! `FileDoc::extra`) for fields it doesn't but must preserve across an
//! update (another writer — the LiveSync plugin — may set fields this tool
//! has no opinion about).

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Prefix every chunk (leaf) document id carries.
pub const LEAF_PREFIX: &str = "h:";

/// A decoded remote document.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteDoc {
    /// File document transported as a single inline payload (`data` present).
    FileInline(FileDoc),
    /// File document transported as an ordered list of chunk ids (`children` present).
    FileChunked(FileDoc),
    /// A chunk ("leaf") document.
    Leaf(LeafDoc),
    /// Anything else — a design document, or a shape this tool doesn't
    /// interpret. Carried verbatim so callers who stumbled onto it by
    /// accident don't silently corrupt it.
    Unknown(RawDoc),
}

/// A file-metadata document, covering both the inline and chunked shapes.
///
/// Exactly one of `data`/`children` is populated; which one determines
/// whether this became a [`RemoteDoc::FileInline`] or
/// [`RemoteDoc::FileChunked`] when decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDoc {
    /// `_id` — the vault-relative path, used verbatim as the document key.
    pub id: String,
    /// `path` — redundant on the wire, equal to `id`.
    pub path: String,
    /// Inline payload, present iff this is an inline-transport document.
    pub data: Option<String>,
    /// Ordered chunk ids, present iff this is a chunked-transport document.
    pub children: Option<Vec<String>>,
    /// UTF-8 byte length of original content (or raw-byte length for binary).
    pub size: u64,
    pub ctime: i64,
    pub mtime: i64,
    /// Revision token; `None` for a document not yet written to the remote.
    pub rev: Option<String>,
    /// Fields present on the wire that this tool doesn't interpret.
    pub extra: Map<String, Value>,
}

/// A chunk ("leaf") document.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafDoc {
    /// `_id` — the chunk identity string (`"h:" || base36(hash)`).
    pub id: String,
    pub data: String,
    pub rev: Option<String>,
    pub extra: Map<String, Value>,
}

/// A document this tool doesn't interpret, kept as a raw JSON map.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDoc {
    pub id: String,
    pub rev: Option<String>,
    pub fields: Map<String, Value>,
}

impl FileDoc {
    /// Build a new chunked file document (no `_rev` — not yet on the remote).
    pub fn new_chunked(path: &str, children: Vec<String>, size: u64, ctime: i64, mtime: i64) -> Self {
        FileDoc {
            id: path.to_string(),
            path: path.to_string(),
            data: None,
            children: Some(children),
            size,
            ctime,
            mtime,
            rev: None,
            extra: Map::new(),
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.children.is_some()
    }
}

/// Decode a raw JSON document body into a [`RemoteDoc`].
///
/// Returns `None` if `value` isn't a JSON object at all (malformed response).
pub fn decode_doc(value: Value) -> Option<RemoteDoc> {
    let Value::Object(mut map) = value else {
        return None;
    };

    let id = take_string(&mut map, "_id")?;
    let rev = take_opt_string(&mut map, "_rev");
    let doc_type = take_opt_string(&mut map, "type");

    if doc_type.as_deref() == Some("leaf") {
        let data = take_string(&mut map, "data").unwrap_or_default();
        return Some(RemoteDoc::Leaf(LeafDoc {
            id,
            data,
            rev,
            extra: map,
        }));
    }

    let has_children = map.contains_key("children");
    let has_data = map.contains_key("data");

    if has_children || has_data {
        let path = take_string(&mut map, "path").unwrap_or_else(|| id.clone());
        let size = map
            .remove("size")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let ctime = map.remove("ctime").and_then(|v| v.as_i64()).unwrap_or(0);
        let mtime = map.remove("mtime").and_then(|v| v.as_i64()).unwrap_or(0);

        if has_children {
            let children = map
                .remove("children")
                .and_then(|v| v.as_array().cloned())
                .map(|arr| {
                    arr.into_iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            let doc = FileDoc {
                id,
                path,
                data: None,
                children: Some(children),
                size,
                ctime,
                mtime,
                rev,
                extra: map,
            };
            return Some(RemoteDoc::FileChunked(doc));
        }

        let data = take_string(&mut map, "data");
        let doc = FileDoc {
            id,
            path,
            data,
            children: None,
            size,
            ctime,
            mtime,
            rev,
            extra: map,
        };
        return Some(RemoteDoc::FileInline(doc));
    }

    Some(RemoteDoc::Unknown(RawDoc {
        id,
        rev,
        fields: map,
    }))
}

/// Encode a [`RemoteDoc`] back to its wire JSON form.
pub fn encode_doc(doc: &RemoteDoc) -> Value {
    match doc {
        RemoteDoc::FileInline(f) | RemoteDoc::FileChunked(f) => {
            let mut map = f.extra.clone();
            map.insert("_id".into(), Value::String(f.id.clone()));
            map.insert("path".into(), Value::String(f.path.clone()));
            map.insert("size".into(), Value::from(f.size));
            map.insert("ctime".into(), Value::from(f.ctime));
            map.insert("mtime".into(), Value::from(f.mtime));
            map.insert("type".into(), Value::String("plain".into()));
            if let Some(rev) = &f.rev {
                map.insert("_rev".into(), Value::String(rev.clone()));
            }
            match &f.children {
                Some(children) => {
                    map.insert(
                        "children".into(),
                        Value::Array(children.iter().cloned().map(Value::String).collect()),
                    );
                }
                None => {
                    map.insert(
                        "data".into(),
                        Value::String(f.data.clone().unwrap_or_default()),
                    );
                }
            }
            Value::Object(map)
        }
        RemoteDoc::Leaf(l) => {
            let mut map = l.extra.clone();
            map.insert("_id".into(), Value::String(l.id.clone()));
            map.insert("data".into(), Value::String(l.data.clone()));
            map.insert("type".into(), Value::String("leaf".into()));
            if let Some(rev) = &l.rev {
                map.insert("_rev".into(), Value::String(rev.clone()));
            }
            Value::Object(map)
        }
        RemoteDoc::Unknown(r) => {
            let mut map = r.fields.clone();
            map.insert("_id".into(), Value::String(r.id.clone()));
            if let Some(rev) = &r.rev {
                map.insert("_rev".into(), Value::String(rev.clone()));
            }
            Value::Object(map)
        }
    }
}

/// Build a brand-new leaf (chunk) document ready for PUT.
pub fn new_leaf(id: &str, data: &str) -> RemoteDoc {
    RemoteDoc::Leaf(LeafDoc {
        id: id.to_string(),
        data: data.to_string(),
        rev: None,
        extra: Map::new(),
    })
}

/// Strip a leading `/` — remote ids are occasionally stored with one.
pub fn trim_leading_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    map.remove(key).and_then(|v| v.as_str().map(|s| s.to_string()))
}

fn take_opt_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    take_string(map, key)
}

/// A page of fetched chunk documents, keyed by chunk id.
pub type ChunkPage = HashMap<String, LeafDoc>;
