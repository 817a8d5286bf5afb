//! Wallet signing keys: generation, WIF encoding and import

use std::str::FromStr;

use bip32::{DerivationPath, XPrv};
use bip39::Mnemonic;

use crate::bitcoin::base58;
use crate::bitcoin::ecdsa;
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::secp256k1::{rand, Message, PublicKey, Secp256k1, SecretKey};
use crate::bitcoin::sighash::{EcdsaSighashType, SighashCache};
use crate::bitcoin::{CompressedPublicKey, Script, Transaction};
use crate::error::{Error, Result};
use crate::networks::Network;

/// Suffix marking a WIF key as belonging to a compressed public key
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// A secp256k1 signing key with its compressed public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WalletKey {
    secret_key: SecretKey,
    public_key: CompressedPublicKey,
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl WalletKey {
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = CompressedPublicKey(PublicKey::from_secret_key(&secp, &secret_key));
        WalletKey {
            secret_key,
            public_key,
        }
    }

    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::new(&mut rand::thread_rng()))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &CompressedPublicKey {
        &self.public_key
    }

    /// Legacy (pre-segwit) `SIGHASH_ALL` signature for one input.
    ///
    /// Returns the DER signature with the sighash type byte appended, ready to
    /// be pushed in a scriptSig.
    pub fn sign_legacy_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        script_code: &Script,
    ) -> Result<Vec<u8>> {
        let sighash = SighashCache::new(tx)
            .legacy_signature_hash(input_index, script_code, EcdsaSighashType::All.to_u32())
            .map_err(|e| Error::Signing(format!("input {}: {}", input_index, e)))?;

        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(ecdsa::Signature::sighash_all(signature).to_vec())
    }

    /// Encode as WIF for the given network (always flagged compressed).
    pub fn to_wif(&self, network: Network) -> String {
        let mut data = Vec::with_capacity(34);
        data.push(network.wif_prefix());
        data.extend_from_slice(&self.secret_key.secret_bytes());
        data.push(WIF_COMPRESSED_FLAG);
        base58::encode_check(&data)
    }

    pub fn from_wif(wif: &str, network: Network) -> Result<Self> {
        let data = base58::decode_check(wif)
            .map_err(|e| Error::InvalidKeyOrPhrase(format!("WIF decode: {}", e)))?;

        let key_bytes = match (data.len(), data.first()) {
            (33, Some(&prefix)) | (34, Some(&prefix)) if prefix == network.wif_prefix() => {
                &data[1..33]
            }
            (33, _) | (34, _) => {
                return Err(Error::InvalidKeyOrPhrase(format!(
                    "WIF key is not for {}",
                    network
                )))
            }
            (len, _) => {
                return Err(Error::InvalidKeyOrPhrase(format!(
                    "WIF payload must be 33 or 34 bytes, got {}",
                    len
                )))
            }
        };
        if data.len() == 34 && data[33] != WIF_COMPRESSED_FLAG {
            return Err(Error::InvalidKeyOrPhrase(
                "WIF compression flag must be 0x01".to_string(),
            ));
        }

        let secret_key = SecretKey::from_slice(key_bytes)
            .map_err(|e| Error::InvalidKeyOrPhrase(format!("invalid secret key: {}", e)))?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Derive the first receive key of the BIP44 account for `network`.
    pub fn from_mnemonic(phrase: &str, network: Network) -> Result<Self> {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let mnemonic = Mnemonic::parse_normalized(&normalized)
            .map_err(|e| Error::InvalidKeyOrPhrase(format!("recovery phrase: {}", e)))?;
        let seed = mnemonic.to_seed_normalized("");

        let path = DerivationPath::from_str(&derivation_path(network))
            .map_err(|e| Error::InvalidKeyOrPhrase(format!("derivation path: {}", e)))?;
        let xprv = XPrv::derive_from_path(seed, &path)
            .map_err(|e| Error::InvalidKeyOrPhrase(format!("key derivation: {}", e)))?;

        let secret_key = SecretKey::from_slice(&xprv.to_bytes())
            .map_err(|e| Error::InvalidKeyOrPhrase(format!("derived key: {}", e)))?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Accepts a recovery phrase, a WIF key or a 64-character hex secret.
    pub fn import(input: &str, network: Network) -> Result<Self> {
        let input = input.trim();
        if input.split_whitespace().count() > 1 {
            return Self::from_mnemonic(input, network);
        }
        if input.len() == 64 && input.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(input)
                .map_err(|e| Error::InvalidKeyOrPhrase(format!("hex key: {}", e)))?;
            let secret_key = SecretKey::from_slice(&bytes)
                .map_err(|e| Error::InvalidKeyOrPhrase(format!("invalid secret key: {}", e)))?;
            return Ok(Self::from_secret_key(secret_key));
        }
        Self::from_wif(input, network)
    }
}

pub fn derivation_path(network: Network) -> String {
    format!("m/44'/{}'/0'/0/0", network.bip44_coin_type())
}
