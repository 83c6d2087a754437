//! Content hashing for downloaded pages.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `text`; identical page bodies share one raw-data entry.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stability() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash("abc"), content_hash("abc"));
    }

    #[test]
    fn hash_distinguishes_texts() {
        assert_ne!(content_hash("<html>a</html>"), content_hash("<html>b</html>"));
        assert_eq!(content_hash("x").len(), 64);
    }
}
