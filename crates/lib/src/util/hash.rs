//! Content checksums for change detection.
//!
//! Checksums are the full lowercase SHA-256 of a payload's JSON text. Objects
//! serialize with sorted keys, so the order in which a document author wrote
//! fields never changes the checksum.

use serde::Serialize;
use sha2::{Digest, Sha256};

pub type HashError = serde_json::Error;

/// Checksum of any serializable value via its compact JSON form.
pub fn checksum<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
  let serialized = serde_json::to_string(value)?;
  Ok(hash_bytes(serialized.as_bytes()))
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn checksum_is_lowercase_hex() {
    let sum = checksum(&json!({"title": "Intro"})).unwrap();
    assert_eq!(sum.len(), 64);
    assert!(sum.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
  }

  #[test]
  fn checksum_ignores_key_order() {
    let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
    let b: serde_json::Value = serde_json::from_str(r#"{"a": {"x": 3, "y": 2}, "b": 1}"#).unwrap();
    assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
  }

  #[test]
  fn checksum_changes_with_content() {
    let a = checksum(&json!({"title": "Intro"})).unwrap();
    let b = checksum(&json!({"title": "Intro!"})).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn hash_bytes_known_value() {
    assert_eq!(
      hash_bytes(b"hello world"),
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
  }
}
