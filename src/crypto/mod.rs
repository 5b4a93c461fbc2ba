//! Cryptographic utilities
//!
//! ECDSA key material over secp256k1 with both public key encodings.

pub mod keys;

pub use keys::{KeyError, KeyMaterial, COMPRESSED_PUBKEY_LEN, UNCOMPRESSED_PUBKEY_LEN};
