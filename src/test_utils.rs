//! Shared fixtures for unit tests

use crate::bitcoin::ecdsa;
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use crate::bitcoin::sighash::SighashCache;
use crate::bitcoin::{CompressedPublicKey, Script, Transaction, Txid};
use crate::keys::WalletKey;
use crate::networks::Network;
use crate::wallet::{Utxo, Wallet};

pub fn test_keypair() -> (SecretKey, CompressedPublicKey) {
    let key = test_key();
    (*key.secret_key(), *key.public_key())
}

pub fn test_key() -> WalletKey {
    WalletKey::from_secret_key(SecretKey::from_slice(&[1u8; 32]).expect("valid key"))
}

pub fn fake_txid(n: u8) -> Txid {
    Txid::from_byte_array([n; 32])
}

/// Mainnet wallet for [`test_key`] holding one P2PKH output per value.
pub fn test_wallet(values: &[u64]) -> Wallet {
    let wallet = Wallet::new(test_key(), Network::Dogecoin);
    let utxos = values
        .iter()
        .enumerate()
        .map(|(i, value)| Utxo {
            txid: fake_txid(i as u8 + 1),
            vout: 0,
            script: wallet.output_script(),
            satoshis: *value,
        })
        .collect();
    Wallet::with_utxos(test_key(), Network::Dogecoin, utxos)
}

/// Check a pushed signature (DER plus sighash byte) against the legacy sighash.
pub fn verify_legacy_signature(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    signature: &[u8],
    public_key: &CompressedPublicKey,
) -> bool {
    let Ok(signature) = ecdsa::Signature::from_slice(signature) else {
        return false;
    };
    let Ok(sighash) = SighashCache::new(tx).legacy_signature_hash(
        input_index,
        script_code,
        signature.sighash_type.to_u32(),
    ) else {
        return false;
    };
    let message = Message::from_digest(sighash.to_byte_array());
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature.signature, &public_key.0)
        .is_ok()
}
