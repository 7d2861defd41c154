//! Content hashing

use sha2::{Digest, Sha256};

/// SHA-256 of the empty string, used for bodiless requests
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Compute the lower-case hex SHA-256 of data
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Verify hash matches data
pub fn verify_sha256(data: impl AsRef<[u8]>, expected_hash: &str) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex(b"Hello, World!");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_empty_hash() {
        assert_eq!(sha256_hex(""), EMPTY_SHA256);
    }

    #[test]
    fn test_verify_sha256() {
        let hash = sha256_hex("payload");
        assert!(verify_sha256("payload", &hash));
        assert!(verify_sha256("payload", &hash.to_uppercase()));
        assert!(!verify_sha256("payload!", &hash));
    }
}
