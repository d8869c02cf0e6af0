use sha2::{Digest, Sha256};

/// SHA-256 of normalized content as lowercase hex.
///
/// Content is hashed exactly as given; normalization happens upstream so the
/// hash agrees with what the diff engine compares.
pub fn content_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
