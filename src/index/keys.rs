//! Store key layout
//!
//! ```text
//! recent buffer:  lvat-<index key>-<value>
//! compacted blob: lvat-<index key>-<value>-gzip
//! ```
//!
//! Any process using the same layout against the same store interoperates.

/// Namespace prefix for every key this service writes
pub const PREFIX: &str = "lvat";

/// Suffix distinguishing the compacted blob from the recent buffer
pub const COMPRESS_SUFFIX: &str = "gzip";

/// Key of the recent buffer for (`key`, `value`)
pub fn build_key(key: &str, value: &str) -> String {
    format!("{}-{}-{}", PREFIX, key, value)
}

/// Key of the compacted blob for (`key`, `value`)
pub fn build_key_compressed(key: &str, value: &str) -> String {
    format!("{}-{}-{}-{}", PREFIX, key, value, COMPRESS_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(build_key("request_id", "req1"), "lvat-request_id-req1");
    }

    #[test]
    fn test_build_key_compressed() {
        assert_eq!(
            build_key_compressed("request_id", "req1"),
            "lvat-request_id-req1-gzip"
        );
        assert_ne!(
            build_key("request_id", "req1"),
            build_key_compressed("request_id", "req1")
        );
    }
}
