//! Content hashing
//!
//! SHA-256 over file contents, streamed in fixed-size chunks. The digest only
//! depends on the bytes, never on the path.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// Read size used while hashing
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Hash everything `reader` yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Hash a file, reporting I/O errors
pub fn try_file_hash(path: &Path) -> io::Result<String> {
    hash_reader(File::open(path)?)
}

/// Hash a file; missing or unreadable files hash to the empty string
pub fn file_hash(path: &Path) -> String {
    match try_file_hash(path) {
        Ok(hash) => hash,
        Err(e) => {
            debug!("Cannot hash {}: {}", path.display(), e);
            String::new()
        }
    }
}

pub fn bytes_hash(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}

fn to_hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
