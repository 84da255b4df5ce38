use std::path::Path;
use sha2::{Digest, Sha256};
use crate::error::Result;
use crate::util::format_hash;

/// Result of comparing a built target against its manifest checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Matched,
    Mismatched { expected: String, actual: String },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Matched)
    }
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Returns `true` if `bytes` hash to `expected`. Both sides are compared as
/// lower-case hex; an optional `sha256:` prefix on `expected` is ignored.
pub fn check_hash(bytes: &[u8], expected: &str) -> bool {
    sha256_hex(bytes) == normalize(expected)
}

/// Hashes the file at `path` and compares it with `expected`.
pub fn verify_file<P: AsRef<Path>>(path: P, expected: &str) -> Result<Verification> {
    let bytes = std::fs::read(path)?;
    let actual = sha256_hex(&bytes);
    let expected = normalize(expected);
    if actual == expected {
        Ok(Verification::Matched)
    } else {
        Ok(Verification::Mismatched { expected, actual })
    }
}

fn normalize(digest: &str) -> String {
    format_hash(digest.trim()).to_lowercase()
}
