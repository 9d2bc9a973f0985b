//! SHA-256 content digests.
//!
//! Digests are rendered as 64 lowercase hex characters and compared
//! case-insensitively. Files are streamed in fixed-size chunks so large
//! binaries never have to be loaded into memory.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer size used while hashing.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Length of a rendered digest.
pub const DIGEST_HEX_LEN: usize = 64;

pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Digests everything `reader` yields until EOF.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Digests a file on disk. Only I/O errors are reported.
pub fn digest_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    digest_reader(file)
}

pub fn digests_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Whether `value` looks like a rendered SHA-256 digest.
pub fn is_valid_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}
