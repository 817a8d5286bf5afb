//! Dogecoin base58check addresses
//!
//! rust-bitcoin's `Address` type only knows Bitcoin version bytes, so Dogecoin
//! addresses are encoded here from the raw hash160 payload and the prefixes in
//! [`Network`].

use std::fmt;

use crate::bitcoin::base58;
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::{CompressedPublicKey, PubkeyHash, Script, ScriptBuf, ScriptHash};
use crate::error::{Error, Result};
use crate::networks::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressPayload {
    PubkeyHash(PubkeyHash),
    ScriptHash(ScriptHash),
}

/// A Dogecoin address bound to the network it was encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    payload: AddressPayload,
}

impl Address {
    pub fn p2pkh(public_key: &CompressedPublicKey, network: Network) -> Self {
        Address {
            network,
            payload: AddressPayload::PubkeyHash(public_key.pubkey_hash()),
        }
    }

    pub fn p2sh(redeem_script: &Script, network: Network) -> Self {
        Address {
            network,
            payload: AddressPayload::ScriptHash(redeem_script.script_hash()),
        }
    }

    /// Parse a base58check address, rejecting addresses of another network.
    pub fn parse(address: &str, network: Network) -> Result<Self> {
        let data = base58::decode_check(address)
            .map_err(|e| Error::invalid_address(address, format!("base58 decode: {}", e)))?;
        if data.len() != 21 {
            return Err(Error::invalid_address(
                address,
                format!("expected 21 payload bytes, got {}", data.len()),
            ));
        }

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&data[1..]);

        let payload = match data[0] {
            prefix if prefix == network.pubkey_address_prefix() => {
                AddressPayload::PubkeyHash(PubkeyHash::from_byte_array(hash))
            }
            prefix if prefix == network.script_address_prefix() => {
                AddressPayload::ScriptHash(ScriptHash::from_byte_array(hash))
            }
            prefix => {
                return Err(Error::invalid_address(
                    address,
                    format!("version byte 0x{:02x} is not valid for {}", prefix, network),
                ))
            }
        };

        Ok(Address { network, payload })
    }

    /// Resolve an output script to an address, if it is P2PKH or P2SH.
    pub fn from_script(script: &Script, network: Network) -> Option<Self> {
        let bytes = script.as_bytes();
        let payload = if script.is_p2pkh() {
            let hash: [u8; 20] = bytes[3..23].try_into().ok()?;
            AddressPayload::PubkeyHash(PubkeyHash::from_byte_array(hash))
        } else if script.is_p2sh() {
            let hash: [u8; 20] = bytes[2..22].try_into().ok()?;
            AddressPayload::ScriptHash(ScriptHash::from_byte_array(hash))
        } else {
            return None;
        };
        Some(Address { network, payload })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn payload(&self) -> &AddressPayload {
        &self.payload
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        match &self.payload {
            AddressPayload::PubkeyHash(hash) => ScriptBuf::new_p2pkh(hash),
            AddressPayload::ScriptHash(hash) => ScriptBuf::new_p2sh(hash),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, hash) = match &self.payload {
            AddressPayload::PubkeyHash(hash) => {
                (self.network.pubkey_address_prefix(), hash.to_byte_array())
            }
            AddressPayload::ScriptHash(hash) => {
                (self.network.script_address_prefix(), hash.to_byte_array())
            }
        };
        let mut data = Vec::with_capacity(21);
        data.push(prefix);
        data.extend_from_slice(&hash);
        f.write_str(&base58::encode_check(&data))
    }
}

/// Convert an address string to its output script
pub fn to_output_script_with_network(address: &str, network: Network) -> Result<ScriptBuf> {
    Address::parse(address, network).map(|a| a.script_pubkey())
}

/// Convert an output script to an address string
pub fn from_output_script_with_network(script: &Script, network: Network) -> Result<String> {
    Address::from_script(script, network)
        .map(|a| a.to_string())
        .ok_or_else(|| {
            Error::invalid_address(
                &hex::encode(script.as_bytes()),
                "output script is neither P2PKH nor P2SH",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_keypair;

    #[test]
    fn test_p2pkh_roundtrip_mainnet() {
        let (_, public_key) = test_keypair();
        let address = Address::p2pkh(&public_key, Network::Dogecoin);
        let encoded = address.to_string();

        assert!(encoded.starts_with('D'), "unexpected address {}", encoded);
        assert_eq!(Address::parse(&encoded, Network::Dogecoin).unwrap(), address);
    }

    #[test]
    fn test_p2pkh_roundtrip_testnet() {
        let (_, public_key) = test_keypair();
        let address = Address::p2pkh(&public_key, Network::DogecoinTestnet);
        let encoded = address.to_string();

        assert!(encoded.starts_with('n'), "unexpected address {}", encoded);
        assert_eq!(
            Address::parse(&encoded, Network::DogecoinTestnet).unwrap(),
            address
        );
    }

    #[test]
    fn test_rejects_other_network() {
        let (_, public_key) = test_keypair();
        let encoded = Address::p2pkh(&public_key, Network::Dogecoin).to_string();
        let err = Address::parse(&encoded, Network::DogecoinTestnet).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Address::parse("not-an-address", Network::Dogecoin).is_err());
        assert!(Address::parse("", Network::Dogecoin).is_err());
    }

    #[test]
    fn test_script_conversion_roundtrip() {
        let (_, public_key) = test_keypair();
        let encoded = Address::p2pkh(&public_key, Network::Dogecoin).to_string();

        let script = to_output_script_with_network(&encoded, Network::Dogecoin).unwrap();
        assert!(script.is_p2pkh());
        assert_eq!(
            from_output_script_with_network(&script, Network::Dogecoin).unwrap(),
            encoded
        );
    }

    #[test]
    fn test_p2sh_address_resolves_from_script() {
        let redeem = ScriptBuf::from_bytes(vec![0x51]);
        let address = Address::p2sh(&redeem, Network::Dogecoin);
        let script = address.script_pubkey();

        assert!(script.is_p2sh());
        assert_eq!(Address::from_script(&script, Network::Dogecoin), Some(address));
        let reparsed = Address::parse(&address.to_string(), Network::Dogecoin).unwrap();
        assert_eq!(reparsed, address);
    }

    #[test]
    fn test_unknown_script_has_no_address() {
        let script = ScriptBuf::from_bytes(vec![0x6a, 0x01, 0x00]);
        assert_eq!(Address::from_script(&script, Network::Dogecoin), None);
        assert!(from_output_script_with_network(&script, Network::Dogecoin).is_err());
    }
}
