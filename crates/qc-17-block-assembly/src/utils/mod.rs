//! Utility modules for block assembly

pub mod hashing;

pub use hashing::{sha256, sha256_h256, transactions_root};
