//! Signing key material
//!
//! Wraps a secp256k1 secret key together with both of its public key
//! encodings. Bare multisig outputs were created over the years with either
//! encoding, so every lookup has to consider the compressed (33 byte) and
//! the uncompressed (65 byte) form of the same key.

use bitcoin::PrivateKey;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Length of a compressed public key
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Length of an uncompressed public key
pub const UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Private key not found")]
    MissingPrivateKey,
    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// A private scalar plus its compressed and uncompressed public encodings.
///
/// Only lives for the duration of a signing call and is never persisted.
#[derive(Clone)]
pub struct KeyMaterial {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("compressed", &hex::encode(self.compressed()))
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Create key material from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create key material from a hex-encoded 32 byte private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidPrivateKey);
        }
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Create key material from a WIF string (mainnet or testnet).
    ///
    /// The compression flag in the WIF payload is ignored since both
    /// encodings are always derived.
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let private_key =
            PrivateKey::from_wif(wif.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(private_key.inner))
    }

    /// Parse either a hex private key or a WIF string.
    ///
    /// A blank input yields [`KeyError::MissingPrivateKey`].
    pub fn parse(input: &str) -> Result<Self, KeyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(KeyError::MissingPrivateKey);
        }
        if input.len() == 64 && input.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::from_private_key_hex(input)
        } else {
            Self::from_wif(input)
        }
    }

    /// The underlying secp256k1 public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Compressed SEC1 encoding (33 bytes)
    pub fn compressed(&self) -> [u8; COMPRESSED_PUBKEY_LEN] {
        self.public_key.serialize()
    }

    /// Uncompressed SEC1 encoding (65 bytes)
    pub fn uncompressed(&self) -> [u8; UNCOMPRESSED_PUBKEY_LEN] {
        self.public_key.serialize_uncompressed()
    }

    /// ECDSA-sign a 32 byte digest.
    ///
    /// With `low_r` set the nonce is ground until R fits in 32 bytes,
    /// which keeps the DER encoding at most 71 bytes.
    pub fn sign_digest(&self, digest: &[u8; 32], low_r: bool) -> Signature {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*digest);
        if low_r {
            secp.sign_ecdsa_low_r(&message, &self.secret_key)
        } else {
            secp.sign_ecdsa(&message, &self.secret_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    fn digest(seed: u8) -> [u8; 32] {
        let mut digest = [0x5a; 32];
        digest[0] = seed;
        digest
    }

    #[test]
    fn test_key_material_from_hex() {
        let keys = KeyMaterial::from_private_key_hex(KEY_ONE).unwrap();
        assert_eq!(
            hex::encode(keys.compressed()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(keys.uncompressed().len(), 65);
        assert_eq!(keys.uncompressed()[0], 0x04);
        assert_eq!(keys.compressed()[1..], keys.uncompressed()[1..33]);
    }

    #[test]
    fn test_wif_matches_hex() {
        // Well known WIF for the scalar 1, compressed and uncompressed forms
        let compressed = KeyMaterial::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn")
            .unwrap();
        let uncompressed =
            KeyMaterial::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf").unwrap();
        let from_hex = KeyMaterial::from_private_key_hex(KEY_ONE).unwrap();

        assert_eq!(compressed.compressed(), from_hex.compressed());
        assert_eq!(uncompressed.uncompressed(), from_hex.uncompressed());
        assert!(KeyMaterial::parse("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf").is_ok());
    }

    #[test]
    fn test_parse_rejects_blank_and_garbage() {
        assert!(matches!(
            KeyMaterial::parse("   "),
            Err(KeyError::MissingPrivateKey)
        ));
        assert!(matches!(
            KeyMaterial::parse("not-a-key"),
            Err(KeyError::InvalidPrivateKey)
        ));
        // Zero is not a valid scalar
        assert!(matches!(
            KeyMaterial::parse(&"0".repeat(64)),
            Err(KeyError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyMaterial::from_private_key_hex(KEY_ONE).unwrap();
        let secp = Secp256k1::verification_only();
        let digest = digest(1);

        for low_r in [false, true] {
            let signature = keys.sign_digest(&digest, low_r);
            assert!(secp
                .verify_ecdsa(&Message::from_digest(digest), &signature, keys.public_key())
                .is_ok());
        }
    }

    #[test]
    fn test_low_r_signature_is_short() {
        let keys = KeyMaterial::from_private_key_hex(KEY_ONE).unwrap();
        for i in 0u8..16 {
            let der = keys.sign_digest(&digest(i), true).serialize_der();
            assert!(der.len() <= 71);
        }
    }
}
