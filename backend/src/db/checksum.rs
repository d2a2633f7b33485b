//! Checksum calculation for processed log content.

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 checksum of a rendered processed log.
///
/// Stored in the index row so unchanged reprocesses and accidental
/// re-uploads can be recognized without reading the file back.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}
