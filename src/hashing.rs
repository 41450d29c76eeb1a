//! Stable structural hashing of resource collections.
//!
//! Values are first converted to a `serde_json::Value`, whose object keys are
//! ordered, so maps with nondeterministic iteration order still hash the same.
//! The digest is the first eight bytes of a SHA-256 over the canonical JSON.
//! Protobuf collections, which are not `Serialize`, go through [`digest_hash`]
//! over their encoded bytes instead.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::{Result, SwitchyardError};

/// Compute the 64-bit content hash of any serializable value.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<u64> {
    let canonical = serde_json::to_value(value)
        .map_err(|e| SwitchyardError::from(e).context("canonicalize for hashing"))?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(digest_hash([bytes.as_slice()]))
}

/// Hash a sequence of byte chunks, e.g. encoded protobuf messages.
///
/// Each chunk is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn digest_hash<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> u64 {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.len() as u64).to_be_bytes());
        hasher.update(chunk);
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Hex rendering of a content hash, used for version strings.
pub fn hash_hex(hash: u64) -> String {
    hex::encode(hash.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_hash_is_stable_across_map_ordering() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..32 {
            a.insert(format!("k{}", i), i);
        }
        for i in (0..32).rev() {
            b.insert(format!("k{}", i), i);
        }
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_detects_changes() {
        let before = vec![json!({"name": "r1", "port": 80})];
        let after = vec![json!({"name": "r1", "port": 81})];
        assert_ne!(content_hash(&before).unwrap(), content_hash(&after).unwrap());
    }

    #[test]
    fn test_hash_depends_on_list_order() {
        let a = vec!["x", "y"];
        let b = vec!["y", "x"];
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_digest_hash_respects_chunk_boundaries() {
        let split_late: [&[u8]; 2] = [b"ab", b"c"];
        let split_early: [&[u8]; 2] = [b"a", b"bc"];
        assert_ne!(digest_hash(split_late), digest_hash(split_early));
        assert_eq!(digest_hash(split_late), digest_hash(split_late));
    }

    #[test]
    fn test_hash_hex_is_fixed_width() {
        assert_eq!(hash_hex(0), "0000000000000000");
        assert_eq!(hash_hex(u64::MAX), "ffffffffffffffff");
    }
}
