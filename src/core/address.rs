//! Address handling
//!
//! Decodes destination addresses into output scripts and derives the legacy
//! pay-to-pubkey-hash address of a public key.

use bitcoin::address::NetworkUnchecked;
use bitcoin::key::CompressedPublicKey;
use bitcoin::{Address, Network, ScriptBuf};
use secp256k1::PublicKey;
use thiserror::Error;

/// Address-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address {address}: {reason}")]
    Invalid { address: String, reason: String },
    #[error("Address {address} does not belong to network {network}")]
    WrongNetwork { address: String, network: Network },
}

/// Output script paying `address`, which must be valid on `network`
pub fn address_to_script(address: &str, network: Network) -> Result<ScriptBuf, AddressError> {
    let address = address.trim();
    let unchecked = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| AddressError::Invalid {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    if !unchecked.is_valid_for_network(network) {
        return Err(AddressError::WrongNetwork {
            address: address.to_string(),
            network,
        });
    }
    Ok(unchecked.assume_checked().script_pubkey())
}

/// P2PKH address of the compressed encoding of `public_key`
pub fn p2pkh_address(public_key: &PublicKey, network: Network) -> Address {
    Address::p2pkh(&CompressedPublicKey(*public_key), network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyMaterial;

    const G_HASH160: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";

    fn generator() -> KeyMaterial {
        KeyMaterial::from_private_key_hex(&format!("{:064x}", 1)).unwrap()
    }

    #[test]
    fn test_p2pkh_round_trip() {
        let address = p2pkh_address(generator().public_key(), Network::Bitcoin);
        assert_eq!(address.to_string(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");

        let script = address_to_script(&address.to_string(), Network::Bitcoin).unwrap();
        assert_eq!(hex::encode(script.as_bytes()), format!("76a914{}88ac", G_HASH160));
        assert!(p2pkh_address(generator().public_key(), Network::Testnet)
            .to_string()
            .starts_with(|c: char| c == 'm' || c == 'n'));
    }

    #[test]
    fn test_p2sh_address() {
        let script = address_to_script("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", Network::Bitcoin)
            .unwrap();
        assert_eq!(
            hex::encode(script.as_bytes()),
            "a914b472a266d0bd89c13706a4132ccfb16f7c3b9fcb87"
        );
    }

    #[test]
    fn test_segwit_addresses() {
        let v0 = address_to_script("BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4", Network::Bitcoin)
            .unwrap();
        assert_eq!(hex::encode(v0.as_bytes()), format!("0014{}", G_HASH160));

        let taproot = address_to_script(
            "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0",
            Network::Bitcoin,
        )
        .unwrap();
        assert_eq!(
            hex::encode(taproot.as_bytes()),
            "512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_rejects_bad_checksum_and_network() {
        assert!(matches!(
            address_to_script("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMJ", Network::Bitcoin),
            Err(AddressError::Invalid { .. })
        ));
        assert!(matches!(
            address_to_script("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Testnet),
            Err(AddressError::WrongNetwork { .. })
        ));
        assert!(address_to_script("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5", Network::Bitcoin)
            .is_err());
    }
}
