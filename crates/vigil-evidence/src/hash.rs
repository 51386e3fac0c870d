//! SHA-256 helpers for forensic hashing.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Computes the lowercase hex SHA-256 digest of the input.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Computes a combined digest over a set of already-computed hashes.
///
/// The hashes are sorted before combining, so the result is independent of
/// the order they were produced in.
#[must_use]
pub fn combine_hashes<S: AsRef<str>>(hashes: &[S]) -> String {
    let mut sorted: Vec<&str> = hashes.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sha256_hex(&sorted.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        let a = sha256_hex("vigil");
        let b = sha256_hex("vigil");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn digest_differs_for_different_input() {
        assert_ne!(sha256_hex("a"), sha256_hex("b"));
    }

    #[test]
    fn combine_is_order_independent() {
        let h1 = sha256_hex("one");
        let h2 = sha256_hex("two");

        assert_eq!(
            combine_hashes(&[h1.as_str(), h2.as_str()]),
            combine_hashes(&[h2.as_str(), h1.as_str()])
        );
    }
}
