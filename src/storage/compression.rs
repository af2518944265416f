//! Compression for compacted blobs
//!
//! A compacted blob is a single gzip stream holding every line appended for
//! one (index, value) pair, each followed by a newline. Appending re-streams
//! the existing history into a fresh encoder and writes the new lines after
//! it, so the result is always one well-formed member.

use crate::storage::error::{StoreError, StoreResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Decompress a stored blob
///
/// `key` is only used to label the error.
pub fn decompress(key: &str, data: &[u8]) -> StoreResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    Ok(out)
}

/// Build a new blob: the decompressed `existing` history followed by `lines`,
/// each newline-terminated
///
/// # Arguments
/// * `key` - Store key the blob lives under (for error reporting)
/// * `existing` - Current stored bytes, `None` if the key is absent
/// * `lines` - Lines to append, in order
pub fn append_lines<L: AsRef<[u8]>>(
    key: &str,
    existing: Option<&[u8]>,
    lines: &[L],
) -> StoreResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());

    if let Some(existing) = existing {
        let mut decoder = GzDecoder::new(existing);
        io::copy(&mut decoder, &mut encoder).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    }

    for line in lines {
        encoder
            .write_all(line.as_ref())
            .and_then(|_| encoder.write_all(b"\n"))
            .map_err(|e| StoreError::Compression(e.to_string()))?;
    }

    encoder
        .finish()
        .map_err(|e| StoreError::Compression(e.to_string()))
}
