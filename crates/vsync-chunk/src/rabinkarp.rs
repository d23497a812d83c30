//! Rabin-Karp rolling-hash content-defined splitter.
//!
//! Byte-for-byte port of Obsidian LiveSync's `splitPiecesRabinKarp`
//! (livesync-commonlib): a 32-bit signed rolling hash over a 48-byte
//! sliding window, with boundary candidates accepted at
//! `hash mod avg_chunk == 1` once `min_chunk` bytes have accumulated, or
//! forced once `max_chunk` bytes have accumulated. A candidate is rejected
//! if it would split a multi-byte UTF-8 codepoint.
//!
//! The arithmetic has to wrap exactly like JavaScript's `Math.imul` /
//! `| 0`: 32-bit signed multiply and add, with the boundary test performed
//! on the *unsigned* reinterpretation of the hash. Using native 64-bit
//! arithmetic anywhere in this function produces different boundaries than
//! the reference on roughly half of all candidate positions.

/// Multiplier for the rolling hash (matches the reference's `PRIME`).
pub const PRIME: i32 = 31;
/// Sliding window size in bytes.
pub const WINDOW: usize = 48;
/// Floor under which `avg_chunk` never drops, regardless of input size.
pub const MIN_PIECE_FLOOR: usize = 128;
/// Target number of pieces an "average" file should split into.
pub const TARGET_PIECE_COUNT: usize = 20;
/// `hash mod avg_chunk` value that marks a boundary candidate.
pub const BOUNDARY_PATTERN: u32 = 1;
/// Default hard ceiling on chunk size — the compatible default.
pub const DEFAULT_ABS_MAX: usize = 250 * 1024;
/// Absolute floor on `min_chunk`, independent of `avg_chunk`.
pub const MIN_FLOOR: usize = 20;

/// Size thresholds derived from an input's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub avg_chunk: usize,
    pub min_chunk: usize,
    pub max_chunk: usize,
}

impl ChunkParams {
    /// Derive avg/min/max chunk sizes for an input of `len` bytes.
    pub fn for_len(len: usize, abs_max: usize) -> Self {
        let avg_chunk = (len / TARGET_PIECE_COUNT).max(MIN_PIECE_FLOOR);
        let max_chunk = abs_max.min(avg_chunk.saturating_mul(5));
        let min_chunk = (avg_chunk / 4).max(MIN_FLOOR).min(max_chunk);
        ChunkParams {
            avg_chunk,
            min_chunk,
            max_chunk,
        }
    }
}

/// 32-bit wrapping multiply — stands in for JavaScript's `Math.imul`.
fn imul(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

/// `PRIME^(WINDOW-1)`, computed with the same wrapping multiply as the
/// main loop (a closed-form `i32::pow` would not wrap identically once the
/// intermediate values overflow).
fn prime_pow_window() -> i32 {
    let mut v: i32 = 1;
    for _ in 0..WINDOW - 1 {
        v = imul(v, PRIME);
    }
    v
}

/// Split `bytes` into content-defined chunks.
///
/// `bytes` must already be the exact payload this tool will transport —
/// UTF-8 text, or a base64-encoded ASCII string for binary files (see
/// `vsync-engine::doccodec`). Returns an empty `Vec` for empty input.
///
/// Byte ranges are contiguous and cover the whole input; concatenating the
/// returned slices in order reproduces `bytes` exactly.
pub fn split(bytes: &[u8], abs_max: usize) -> Vec<&[u8]> {
    let len = bytes.len();
    if len == 0 {
        return Vec::new();
    }

    let params = ChunkParams::for_len(len, abs_max);
    let p_pow_w = prime_pow_window();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut hash: i32 = 0;

    for pos in 0..len {
        let byte_val = bytes[pos] as i32;

        if pos >= start + WINDOW {
            let old_byte = bytes[pos - WINDOW] as i32;
            let old_byte_term = imul(old_byte, p_pow_w);
            hash = hash.wrapping_sub(old_byte_term);
            hash = imul(hash, PRIME);
            hash = hash.wrapping_add(byte_val);
        } else {
            hash = imul(hash, PRIME);
            hash = hash.wrapping_add(byte_val);
        }

        let current_size = pos - start + 1;
        let mut is_boundary = false;

        if current_size >= params.min_chunk {
            let unsigned_hash = hash as u32;
            if (unsigned_hash as u64) % (params.avg_chunk as u64) == BOUNDARY_PATTERN as u64 {
                is_boundary = true;
            }
        }
        if current_size >= params.max_chunk {
            is_boundary = true;
        }

        if is_boundary {
            // Reject boundaries that would split a multi-byte UTF-8 codepoint:
            // the next byte is a continuation byte (top two bits `10`).
            let is_safe = !(pos + 1 < len && (bytes[pos + 1] & 0xc0) == 0x80);
            if is_safe {
                chunks.push(&bytes[start..=pos]);
                start = pos + 1;
            }
        }
    }

    if start < len {
        chunks.push(&bytes[start..len]);
    }

    chunks
}


#[cfg(test)]
mod proptest_suite {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Round-trip: concatenating emitted chunks reproduces the input exactly.
        #[test]
        fn round_trip(data in proptest::collection::vec(any::<u8>(), 0..=8192)) {
            let chunks = split(&data, DEFAULT_ABS_MAX);
            let mut out = Vec::with_capacity(data.len());
            for c in &chunks {
                out.extend_from_slice(c);
            }
            prop_assert_eq!(out, data);
        }

        /// Determinism: splitting the same bytes twice gives identical boundaries.
        #[test]
        fn deterministic(data in proptest::collection::vec(any::<u8>(), 0..=8192)) {
            let a = split(&data, DEFAULT_ABS_MAX);
            let b = split(&data, DEFAULT_ABS_MAX);
            prop_assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b.iter()) {
                prop_assert_eq!(x, y);
            }
        }

        /// No emitted boundary falls between two bytes of a multi-byte codepoint.
        #[test]
        fn utf8_safety(s in ".*") {
            let data = s.as_bytes();
            let chunks = split(data, DEFAULT_ABS_MAX);
            let mut offset = 0usize;
            for c in &chunks {
                offset += c.len();
                if offset < data.len() {
                    prop_assert_ne!(data[offset] & 0xc0, 0x80);
                }
            }
        }

        /// Size bounds: every chunk but the last falls in [min_chunk, max_chunk];
        /// the last falls in [1, max_chunk].
        #[test]
        fn size_bounds(data in proptest::collection::vec(any::<u8>(), 1..=16384)) {
            let params = ChunkParams::for_len(data.len(), DEFAULT_ABS_MAX);
            let chunks = split(&data, DEFAULT_ABS_MAX);
            let n = chunks.len();
            for (i, c) in chunks.iter().enumerate() {
                if i + 1 < n {
                    prop_assert!(c.len() >= params.min_chunk);
                    prop_assert!(c.len() <= params.max_chunk);
                } else {
                    prop_assert!(c.len() >= 1);
                    prop_assert!(c.len() <= params.max_chunk);
                }
            }
        }

        /// Boundary stability: re-splitting a prefix up to an existing boundary
        /// reproduces the same chunk sequence for that prefix.
        #[test]
        fn boundary_stable_under_prefix_extension(data in proptest::collection::vec(any::<u8>(), 1..=4096)) {
            let chunks = split(&data, DEFAULT_ABS_MAX);
            if chunks.len() >= 2 {
                let cut = chunks[0].len();
                let prefix = &data[..cut];
                let prefix_chunks = split(prefix, DEFAULT_ABS_MAX);
                prop_assert_eq!(prefix_chunks.len(), 1);
                prop_assert_eq!(prefix_chunks[0], chunks[0]);
            }
        }
    }
}
