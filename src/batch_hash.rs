use log::warn;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::header::normalize_label;
use crate::models::{ParsedMovement, SourceFile};

pub const SHA256: &str = "sha256";
pub const FALLBACK: &str = "fnv1a-64";

/// A cryptographic digest primitive. Hosts without one get the weaker fallback.
pub trait ContentDigest: Send + Sync {
    fn algorithm(&self) -> &'static str;
    fn digest(&self, bytes: &[u8]) -> std::result::Result<Vec<u8>, String>;
}

pub struct Sha256Digest;

impl ContentDigest for Sha256Digest {
    fn algorithm(&self) -> &'static str {
        SHA256
    }

    fn digest(&self, bytes: &[u8]) -> std::result::Result<Vec<u8>, String> {
        Ok(Sha256::digest(bytes).to_vec())
    }
}

/// Idempotency key of an uploaded file. `degraded` marks the non-cryptographic fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchHash {
    pub value: String,
    pub algorithm: String,
    pub degraded: bool,
}

impl std::fmt::Display for BatchHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// FNV-1a over filename, size and content. Deterministic but not collision resistant.
pub fn fallback_hash(name: &str, size: u64, bytes: &[u8]) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for b in name
        .as_bytes()
        .iter()
        .chain(size.to_le_bytes().iter())
        .chain(bytes.iter())
    {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{hash:016x}")
}

/// Hash the entire raw file. Never fails: a digest error downgrades to the fallback.
pub fn compute_batch_hash_with(file: &SourceFile, digest: Option<&dyn ContentDigest>) -> BatchHash {
    if let Some(digest) = digest {
        match digest.digest(&file.bytes) {
            Ok(bytes) => {
                return BatchHash {
                    value: hex::encode(bytes),
                    algorithm: digest.algorithm().to_string(),
                    degraded: false,
                }
            }
            Err(e) => warn!(
                "{}: {} digest failed ({e}), using non-cryptographic fallback",
                file.name,
                digest.algorithm()
            ),
        }
    } else {
        warn!("{}: no digest available, using non-cryptographic fallback", file.name);
    }
    BatchHash {
        value: fallback_hash(&file.name, file.bytes.len() as u64, &file.bytes),
        algorithm: FALLBACK.to_string(),
        degraded: true,
    }
}

pub fn compute_batch_hash(file: &SourceFile) -> BatchHash {
    compute_batch_hash_with(file, Some(&Sha256Digest))
}

/// Row-level duplicate key: date, amount to the cent and normalized description.
pub fn movement_fingerprint(movement: &ParsedMovement) -> String {
    let key = format!(
        "{}|{:.2}|{}",
        movement.date.format("%Y-%m-%d"),
        movement.amount,
        normalize_label(&movement.description)
    );
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct BrokenDigest;

    impl ContentDigest for BrokenDigest {
        fn algorithm(&self) -> &'static str {
            "broken"
        }

        fn digest(&self, _bytes: &[u8]) -> std::result::Result<Vec<u8>, String> {
            Err("unavailable".to_string())
        }
    }

    fn movement(description: &str, amount: f64) -> ParsedMovement {
        ParsedMovement {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value_date: None,
            amount,
            description: description.to_string(),
            counterparty: None,
            balance: None,
            original_row_index: 1,
            raw_data: BTreeMap::new(),
        }
    }

    #[test]
    fn test_hash_is_stable() {
        let file = SourceFile::new("a.csv", b"Fecha;Importe\n01/01/2024;1,00\n".to_vec());
        let first = compute_batch_hash(&file);
        let second = compute_batch_hash(&file);
        assert_eq!(first, second);
        assert_eq!(first.algorithm, SHA256);
        assert_eq!(first.value.len(), 64);
        assert!(!first.degraded);
    }

    #[test]
    fn test_known_sha256() {
        let file = SourceFile::new("abc.csv", b"abc".to_vec());
        assert_eq!(
            compute_batch_hash(&file).value,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_single_byte_change_changes_hash() {
        let a = SourceFile::new("a.csv", b"01/01/2024;1,00".to_vec());
        let b = SourceFile::new("a.csv", b"01/01/2024;1,01".to_vec());
        assert_ne!(compute_batch_hash(&a), compute_batch_hash(&b));
    }

    #[test]
    fn test_hash_ignores_filename() {
        let a = SourceFile::new("enero.csv", b"same".to_vec());
        let b = SourceFile::new("copia.csv", b"same".to_vec());
        assert_eq!(compute_batch_hash(&a).value, compute_batch_hash(&b).value);
    }

    #[test]
    fn test_digest_failure_downgrades() {
        let file = SourceFile::new("a.csv", b"content".to_vec());
        let hash = compute_batch_hash_with(&file, Some(&BrokenDigest));
        assert!(hash.degraded);
        assert_eq!(hash.algorithm, FALLBACK);
        assert_eq!(hash.value, fallback_hash("a.csv", 7, b"content"));
        assert_eq!(compute_batch_hash_with(&file, None), hash);
    }

    #[test]
    fn test_fallback_hash_is_deterministic_and_sensitive() {
        assert_eq!(fallback_hash("a", 1, b"x"), fallback_hash("a", 1, b"x"));
        assert_ne!(fallback_hash("a", 1, b"x"), fallback_hash("a", 1, b"y"));
        assert_ne!(fallback_hash("a", 1, b"x"), fallback_hash("b", 1, b"x"));
        assert_eq!(fallback_hash("", 0, b"").len(), 16);
    }

    #[test]
    fn test_movement_fingerprint() {
        let a = movement("Transferencia  RECIBIDA", 10.0);
        let b = movement("transferencia recibida", 10.001);
        let c = movement("transferencia recibida", 10.5);
        assert_eq!(movement_fingerprint(&a), movement_fingerprint(&b));
        assert_ne!(movement_fingerprint(&a), movement_fingerprint(&c));
    }
}
