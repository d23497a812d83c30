//! Chunk identity: `"h:" || base36(xxhash64(bytes || "-" || decimal_len(bytes)))`.
//!
//! The length suffix is joined to the payload as text before hashing, not
//! mixed in as a separate hasher update — `xxhash64(b"ab-2")` is not the
//! same value as two `write()` calls with `b"ab"` then `b"-2"` would
//! produce if a different hash were used, so the concatenation has to
//! happen first.

use std::hash::Hasher;
use twox_hash::XxHash64;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase base-36 encoding of an unsigned 64-bit integer, shortest form
/// (no leading zeros, `0` encodes as `"0"`).
pub fn base36_lower(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while n > 0 {
        buf.push(BASE36_ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    // Safe: every pushed byte comes from an ASCII alphabet.
    String::from_utf8(buf).expect("base36 alphabet is ASCII")
}

/// xxHash64 of `data` with the given seed.
pub fn xxhash64(seed: u64, data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(data);
    hasher.finish()
}

/// Compute a chunk's identity string for its exact byte payload.
pub fn chunk_id(bytes: &[u8]) -> String {
    let len_str = bytes.len().to_string();
    let mut input = Vec::with_capacity(bytes.len() + 1 + len_str.len());
    input.extend_from_slice(bytes);
    input.push(b'-');
    input.extend_from_slice(len_str.as_bytes());

    let hash = xxhash64(0, &input);
    format!("h:{}", base36_lower(hash))
}
