//! Encode a local file's bytes for push; decode a remote payload for pull.
//!
//! Push and pull are deliberately asymmetric (Open Question 1, resolved in
//! DESIGN.md): push always treats local bytes as UTF-8 text and rejects
//! anything else as an [`vsync_core::SyncError::Encoding`] rather than
//! base64-encoding it, because base64-encoding on the way up would change
//! the bytes chunk identity is computed over and defeat dedup against the
//! existing plugin ecosystem. Pull still detects and decodes base64 the way
//! that ecosystem writes binary files.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use vsync_core::doc::{FileDoc, LeafDoc};
use vsync_core::error::{SyncError, SyncResult};

/// Validate that `bytes` is text this tool can push, returning it as a
/// `String` ready for chunking.
pub fn prepare_push_payload(bytes: &[u8]) -> SyncResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| SyncError::Encoding("local file is not valid UTF-8 text".to_string()))
}

/// Reassemble a document's wire payload from its chunk list, or return its
/// inline `data` directly if it wasn't chunked.
pub fn assemble_pull_payload(doc: &FileDoc, chunks: &HashMap<String, LeafDoc>) -> SyncResult<String> {
    match &doc.children {
        Some(ids) => {
            let mut out = String::new();
            for id in ids {
                let leaf = chunks
                    .get(id)
                    .ok_or_else(|| SyncError::MissingChunk(id.clone()))?;
                out.push_str(&leaf.data);
            }
            Ok(out)
        }
        None => Ok(doc.data.clone().unwrap_or_default()),
    }
}

/// Bytes decoded from a wire payload, ready to write to disk.
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
}

/// Detect and decode a base64-wrapped binary payload; fall back to treating
/// the payload as plain UTF-8 text.
pub fn decode_wire_payload(payload: &str) -> DecodedPayload {
    if looks_like_base64(payload) {
        if let Ok(raw) = BASE64.decode(payload) {
            return DecodedPayload { bytes: raw };
        }
    }
    DecodedPayload {
        bytes: payload.as_bytes().to_vec(),
    }
}

/// Single-line, non-empty: the cheap pre-filter before attempting a strict
/// base64 decode (§4.2's "payload is single-line" rule).
fn looks_like_base64(payload: &str) -> bool {
    !payload.is_empty() && !payload.contains('\n') && !payload.contains('\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn leaf(id: &str, data: &str) -> LeafDoc {
        LeafDoc {
            id: id.to_string(),
            data: data.to_string(),
            rev: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn rejects_non_utf8_on_push() {
        let bytes = vec![0xff, 0xfe, 0x00, 0x01];
        let err = prepare_push_payload(&bytes).unwrap_err();
        assert!(matches!(err, SyncError::Encoding(_)));
    }

    #[test]
    fn accepts_utf8_on_push() {
        let bytes = "hello \u{1F600}".as_bytes();
        assert_eq!(prepare_push_payload(bytes).unwrap(), "hello \u{1F600}");
    }

    #[test]
    fn assembles_chunked_payload_in_children_order() {
        let doc = FileDoc::new_chunked("a.md", vec!["h:1".into(), "h:2".into()], 8, 0, 0);
        let mut chunks = HashMap::new();
        chunks.insert("h:1".to_string(), leaf("h:1", "ab"));
        chunks.insert("h:2".to_string(), leaf("h:2", "cdef"));
        assert_eq!(assemble_pull_payload(&doc, &chunks).unwrap(), "abcdef");
    }

    #[test]
    fn missing_chunk_is_an_error() {
        let doc = FileDoc::new_chunked("a.md", vec!["h:missing".into()], 0, 0, 0);
        let err = assemble_pull_payload(&doc, &HashMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::MissingChunk(_)));
    }

    #[test]
    fn inline_payload_used_directly() {
        let mut doc = FileDoc::new_chunked("a.md", vec![], 0, 0, 0);
        doc.children = None;
        doc.data = Some("inline text".to_string());
        assert_eq!(assemble_pull_payload(&doc, &HashMap::new()).unwrap(), "inline text");
    }

    #[test]
    fn decodes_base64_binary_payload() {
        let raw = [0u8, 159, 146, 150]; // not valid UTF-8
        let encoded = BASE64.encode(raw);
        let decoded = decode_wire_payload(&encoded);
        assert_eq!(decoded.bytes, raw);
    }

    #[test]
    fn leaves_plain_text_payload_untouched() {
        let decoded = decode_wire_payload("just some plain text, not base64-shaped!!");
        assert_eq!(decoded.bytes, b"just some plain text, not base64-shaped!!");
    }

    #[test]
    fn multiline_payload_is_never_treated_as_base64() {
        let decoded = decode_wire_payload("line one\nline two\n");
        assert_eq!(decoded.bytes, "line one\nline two\n".as_bytes());
    }
}
