//! Wallet ledger
//!
//! The wallet is the authoritative UTXO set. It is updated as soon as a
//! transaction is built, before the network has seen it, so the next
//! transaction of a chain can spend outputs that only exist locally.

mod store;

pub use store::{WalletGuard, WalletRecord, WalletStore};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::bitcoin::{Amount, OutPoint, Script, ScriptBuf, Transaction, TxOut, Txid};
use crate::keys::WalletKey;
use crate::networks::Network;

/// An unspent output owned by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub script: ScriptBuf,
    pub satoshis: u64,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }

    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.satoshis),
            script_pubkey: self.script.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wallet {
    network: Network,
    key: WalletKey,
    address: Address,
    utxos: Vec<Utxo>,
}

impl Wallet {
    pub fn new(key: WalletKey, network: Network) -> Self {
        Self::with_utxos(key, network, Vec::new())
    }

    pub fn with_utxos(key: WalletKey, network: Network, utxos: Vec<Utxo>) -> Self {
        let address = Address::p2pkh(key.public_key(), network);
        let mut wallet = Wallet {
            network,
            key,
            address,
            utxos: Vec::with_capacity(utxos.len()),
        };
        wallet.apply(&[], utxos);
        wallet
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn key(&self) -> &WalletKey {
        &self.key
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn output_script(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    pub fn balance(&self) -> u64 {
        self.utxos.iter().map(|u| u.satoshis).sum()
    }

    /// `true` if `script` pays this wallet's address.
    pub fn owns_script(&self, script: &Script) -> bool {
        Address::from_script(script, self.network).as_ref() == Some(&self.address)
    }

    /// Remove `spent` outpoints and add `created` outputs.
    ///
    /// Outputs already present (same txid and vout) are not added twice.
    pub fn apply(&mut self, spent: &[OutPoint], created: Vec<Utxo>) {
        self.utxos.retain(|utxo| !spent.contains(&utxo.outpoint()));
        for utxo in created {
            if !self.utxos.iter().any(|u| u.outpoint() == utxo.outpoint()) {
                self.utxos.push(utxo);
            }
        }
    }

    /// Ledger update for a built (not necessarily broadcast) transaction.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        let txid = tx.compute_txid();
        let spent: Vec<OutPoint> = tx.input.iter().map(|input| input.previous_output).collect();
        let created: Vec<Utxo> = tx
            .output
            .iter()
            .enumerate()
            .filter(|(_, output)| self.owns_script(&output.script_pubkey))
            .map(|(vout, output)| Utxo {
                txid,
                vout: vout as u32,
                script: output.script_pubkey.clone(),
                satoshis: output.value.to_sat(),
            })
            .collect();
        self.apply(&spent, created);
    }

    /// Replace the whole UTXO set. Only the balance synchronizer does this.
    pub(crate) fn replace_utxos(&mut self, utxos: Vec<Utxo>) {
        self.utxos.clear();
        self.apply(&[], utxos);
    }
}
