//! LiveSync-compatible content-defined chunking.
//!
//! This crate exists solely to reproduce Obsidian LiveSync's chunk
//! boundaries and chunk identity, bit-for-bit, so chunks this tool writes
//! are recognized (and deduplicated against) by the existing plugin
//! ecosystem. See [`rabinkarp`] for the splitter and [`identity`] for the
//! id scheme; [`chunk_payload`] wires the two together.

pub mod identity;
pub mod rabinkarp;

pub use identity::chunk_id;
pub use rabinkarp::{split, ChunkParams, DEFAULT_ABS_MAX};

/// One content-defined chunk: its identity string and owned bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub data: Vec<u8>,
}

/// Split `bytes` and compute each piece's identity, using the default
/// maximum chunk size.
pub fn chunk_payload(bytes: &[u8]) -> Vec<Chunk> {
    chunk_payload_with_max(bytes, DEFAULT_ABS_MAX)
}

/// Split `bytes` and compute each piece's identity, with an explicit
/// maximum chunk size (tests use this to exercise small inputs without
/// allocating megabytes of filler).
pub fn chunk_payload_with_max(bytes: &[u8], abs_max: usize) -> Vec<Chunk> {
    split(bytes, abs_max)
        .into_iter()
        .map(|piece| Chunk {
            id: chunk_id(piece),
            data: piece.to_vec(),
        })
        .collect()
}
