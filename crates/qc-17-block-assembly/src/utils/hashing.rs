//! Hashing utilities for block assembly
//!
//! All commitments are SHA-256 over canonical RLP encodings.

use primitive_types::H256;
use rlp::RlpStream;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute SHA-256 hash of data as H256
#[inline]
pub fn sha256_h256(data: &[u8]) -> H256 {
    H256::from(sha256(data))
}

/// Commitment to an ordered list of transaction hashes
///
/// Order-sensitive: the same hashes in a different order give a different root.
pub fn transactions_root(hashes: &[H256]) -> H256 {
    let mut stream = RlpStream::new_list(hashes.len());
    for hash in hashes {
        stream.append(hash);
    }
    sha256_h256(&stream.out())
}
