//! Engine operations
//!
//! Every mutating operation runs under the exclusive wallet lock, builds its
//! transactions against a copy of the ledger and only commits ledger changes
//! as each transaction is accepted by the node.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::address::Address;
use crate::bitcoin::{Amount, TxOut, Txid};
use crate::broadcast::{read_pending, Broadcaster, NodeClient, RetryPolicy};
use crate::error::{EnvelopeError, Error, Result};
use crate::funding::{Draft, FeeRate, TransactionFunder};
use crate::inscriptions::build_inscription_chain;
use crate::keys::WalletKey;
use crate::networks::Network;
use crate::sync::{sync_wallet, UtxoIndexer};
use crate::wallet::WalletStore;

pub const DEFAULT_WALLET_PATH: &str = ".wallet.json";
pub const DEFAULT_PENDING_PATH: &str = "pending-txs.json";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub network: Network,
    pub wallet_path: PathBuf,
    /// Where the unsubmitted remainder of an interrupted chain is kept
    pub pending_path: PathBuf,
    pub fee_rate: FeeRate,
    pub retry: RetryPolicy,
}

impl EngineConfig {
    pub fn new(network: Network) -> Self {
        EngineConfig {
            network,
            wallet_path: PathBuf::from(DEFAULT_WALLET_PATH),
            pending_path: PathBuf::from(DEFAULT_PENDING_PATH),
            fee_rate: FeeRate::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

pub struct Engine<C, I> {
    config: EngineConfig,
    store: WalletStore,
    funder: TransactionFunder,
    broadcaster: Broadcaster<C>,
    indexer: Option<I>,
}

impl<C: NodeClient, I: UtxoIndexer> Engine<C, I> {
    pub fn new(config: EngineConfig, client: C, indexer: Option<I>) -> Self {
        Engine {
            store: WalletStore::new(config.wallet_path.clone(), config.network),
            funder: TransactionFunder::new(config.fee_rate),
            broadcaster: Broadcaster::new(client, config.retry),
            indexer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    /// Generate a fresh key and persist an empty wallet for it.
    pub fn create_wallet(&self) -> Result<Address> {
        let wallet = self.store.create(WalletKey::generate())?;
        info!(address = %wallet.address(), "wallet created");
        Ok(*wallet.address())
    }

    /// Import a WIF key, a 64-character hex key or a BIP39 phrase.
    pub fn import_wallet(&self, key_or_phrase: &str) -> Result<Address> {
        let key = WalletKey::import(key_or_phrase, self.config.network)?;
        let wallet = self.store.create(key)?;
        info!(address = %wallet.address(), "wallet imported");
        Ok(*wallet.address())
    }

    pub fn address(&self) -> Result<Address> {
        Ok(*self.store.load()?.address())
    }

    /// Sum of the local UTXO set; no network access.
    pub fn balance(&self) -> Result<u64> {
        Ok(self.store.load()?.balance())
    }

    pub fn sync(&self) -> Result<u64> {
        let indexer = self.indexer.as_ref().ok_or_else(|| {
            Error::Indexer(format!("no indexer configured for {}", self.config.network))
        })?;
        let mut guard = self.store.lock()?;
        sync_wallet(&mut guard, indexer)
    }

    /// Inscribe `data` and return the id of the transaction paying `destination`.
    ///
    /// Without a destination the inscription goes back to the wallet address.
    pub fn inscribe(
        &self,
        destination: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> Result<Txid> {
        let mut guard = self.store.lock()?;
        self.ensure_nothing_pending()?;
        let destination = match destination {
            Some(address) => Address::parse(address, self.config.network)?,
            None => *guard.wallet().address(),
        };

        let mut scratch = guard.wallet().clone();
        let chain = build_inscription_chain(
            &mut scratch,
            &self.funder,
            &destination,
            content_type,
            data,
        )?;
        let final_txid = chain
            .final_txid()
            .ok_or_else(|| EnvelopeError::Malformed("empty transaction chain".into()))?;
        info!(
            %destination,
            content_type,
            bytes = data.len(),
            transactions = chain.len(),
            "inscription chain built"
        );

        self.broadcaster.broadcast_chain(
            &mut guard,
            chain.transactions(),
            Some(self.config.pending_path.as_path()),
        )?;
        Ok(final_txid)
    }

    /// Pay `amount` koinu to `destination`.
    pub fn send(&self, destination: &str, amount: u64) -> Result<Txid> {
        let mut guard = self.store.lock()?;
        self.ensure_nothing_pending()?;
        let destination = Address::parse(destination, self.config.network)?;

        let mut draft = Draft::new();
        draft.add_output(TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: destination.script_pubkey(),
        });
        let funded = self.funder.fund(guard.wallet(), draft)?;
        info!(%destination, amount, fee = funded.fee, "payment built");

        self.broadcaster.broadcast_chain(
            &mut guard,
            std::slice::from_ref(&funded.tx),
            Some(self.config.pending_path.as_path()),
        )?;
        Ok(funded.tx.compute_txid())
    }

    /// Spend the whole wallet into `count` outputs to itself.
    ///
    /// `count - 1` outputs carry `balance / count` each, the change output
    /// takes the remainder minus the fee.
    pub fn split(&self, count: usize) -> Result<Txid> {
        if count == 0 {
            return Err(Error::InvalidSplitCount(count));
        }
        let mut guard = self.store.lock()?;
        self.ensure_nothing_pending()?;
        let wallet = guard.wallet();
        let share = wallet.balance() / count as u64;

        let mut draft = Draft::new();
        for _ in 1..count {
            draft.add_output(TxOut {
                value: Amount::from_sat(share),
                script_pubkey: wallet.output_script(),
            });
        }
        let funded = self.funder.fund_all(wallet, draft)?;
        info!(count, share, fee = funded.fee, "split built");

        self.broadcaster.broadcast_chain(
            &mut guard,
            std::slice::from_ref(&funded.tx),
            Some(self.config.pending_path.as_path()),
        )?;
        Ok(funded.tx.compute_txid())
    }

    /// Rebroadcast the remainder of an interrupted chain.
    ///
    /// Returns the submitted ids, empty when nothing was pending. The pending
    /// file is removed once every transaction is accepted, or right away when
    /// it lists none.
    pub fn resume_pending(&self) -> Result<Vec<Txid>> {
        let mut guard = self.store.lock()?;
        let pending_path = self.config.pending_path.as_path();
        let transactions = read_pending(pending_path)?;
        if transactions.is_empty() {
            if pending_path.exists() {
                fs::remove_file(pending_path)?;
            }
            return Ok(Vec::new());
        }

        info!(
            count = transactions.len(),
            path = %pending_path.display(),
            "resuming pending chain"
        );
        let txids = self
            .broadcaster
            .broadcast_chain(&mut guard, &transactions, Some(pending_path))?;
        fs::remove_file(pending_path)?;
        Ok(txids)
    }

    /// Spending while a remainder is saved would double-spend its inputs.
    /// Callers must hold the wallet lock.
    fn ensure_nothing_pending(&self) -> Result<()> {
        let pending_path = &self.config.pending_path;
        if read_pending(pending_path)?.is_empty() {
            Ok(())
        } else {
            Err(Error::PendingChain(pending_path.clone()))
        }
    }
}
