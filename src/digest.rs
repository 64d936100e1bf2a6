//! Canonical serialization and SHA-256 digests of block fields.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Encode `(name, value)` pairs as a compact JSON object with keys sorted
/// by name. The input order does not matter.
pub fn canonical_encoding(fields: &[(&str, Value)]) -> String {
    let mut sorted: Vec<&(&str, Value)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::with_capacity(256);
    out.push('{');
    for (i, (name, value)) in sorted.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Value's Display writes escaped, compact JSON.
        out.push_str(&Value::from(*name).to_string());
        out.push(':');
        out.push_str(&value.to_string());
    }
    out.push('}');
    out
}

/// Lowercase hex SHA-256 of the canonical encoding of `fields`.
pub fn digest_fields(fields: &[(&str, Value)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_encoding(fields).as_bytes());
    hex::encode(hasher.finalize())
}

/// True when `hex_hash` starts with `difficulty` `'0'` characters.
pub fn meets_difficulty(hex_hash: &str, difficulty: usize) -> bool {
    hex_hash.len() >= difficulty && hex_hash.bytes().take(difficulty).all(|b| b == b'0')
}
