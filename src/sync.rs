//! Balance synchronization against a remote UTXO indexer

use std::str::FromStr;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::address::Address;
use crate::bitcoin::{ScriptBuf, Txid};
use crate::error::{Error, Result};
use crate::wallet::{Utxo, WalletGuard};

/// dogechain.info API root, the default indexer on mainnet
pub const DOGECHAIN_API: &str = "https://dogechain.info/api/v1";

/// Lists the unspent outputs of an address.
pub trait UtxoIndexer {
    fn unspent_outputs(&self, address: &Address) -> Result<Vec<Utxo>>;
}

impl<T: UtxoIndexer + ?Sized> UtxoIndexer for &T {
    fn unspent_outputs(&self, address: &Address) -> Result<Vec<Utxo>> {
        (**self).unspent_outputs(address)
    }
}

/// Client for the dogechain.info v1 `address/unspent` endpoint
#[derive(Debug, Clone)]
pub struct DogechainIndexer {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct UnspentResponse {
    unspent_outputs: Vec<UnspentOutput>,
}

#[derive(Deserialize)]
struct UnspentOutput {
    tx_hash: String,
    tx_output_n: u32,
    script: String,
    value: Koinu,
}

/// The API has served amounts both as numbers and as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Koinu {
    Number(u64),
    Text(String),
}

impl Koinu {
    fn to_u64(&self) -> Result<u64> {
        match self {
            Koinu::Number(n) => Ok(*n),
            Koinu::Text(s) => s
                .parse()
                .map_err(|e| Error::Indexer(format!("invalid amount {:?}: {}", s, e))),
        }
    }
}

impl UnspentOutput {
    fn into_utxo(self) -> Result<Utxo> {
        let txid = Txid::from_str(&self.tx_hash)
            .map_err(|e| Error::Indexer(format!("invalid tx_hash {:?}: {}", self.tx_hash, e)))?;
        let script = hex::decode(&self.script)
            .map_err(|e| Error::Indexer(format!("invalid script {:?}: {}", self.script, e)))?;
        Ok(Utxo {
            txid,
            vout: self.tx_output_n,
            script: ScriptBuf::from_bytes(script),
            satoshis: self.value.to_u64()?,
        })
    }
}

impl DogechainIndexer {
    pub fn new(base_url: impl Into<String>) -> Self {
        DogechainIndexer {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for DogechainIndexer {
    fn default() -> Self {
        Self::new(DOGECHAIN_API)
    }
}

impl UtxoIndexer for DogechainIndexer {
    fn unspent_outputs(&self, address: &Address) -> Result<Vec<Utxo>> {
        let url = format!("{}/address/unspent/{}", self.base_url, address);
        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Indexer(e.to_string()))?;
        let body: UnspentResponse = response
            .json()
            .map_err(|e| Error::Indexer(format!("unexpected response from {}: {}", url, e)))?;

        body.unspent_outputs
            .into_iter()
            .map(UnspentOutput::into_utxo)
            .collect()
    }
}

/// Replace the wallet's UTXO set with the indexer's view and persist it.
///
/// Outputs that do not pay the wallet address are dropped. Returns the new
/// balance.
pub fn sync_wallet<I: UtxoIndexer>(guard: &mut WalletGuard<'_>, indexer: &I) -> Result<u64> {
    let address = *guard.wallet().address();
    let fetched = indexer.unspent_outputs(&address)?;

    let wallet = guard.wallet_mut();
    let (owned, foreign): (Vec<Utxo>, Vec<Utxo>) = fetched
        .into_iter()
        .partition(|utxo| wallet.owns_script(&utxo.script));
    for utxo in &foreign {
        warn!(
            txid = %utxo.txid,
            vout = utxo.vout,
            "indexer returned an output not paying the wallet, dropped"
        );
    }

    wallet.replace_utxos(owned);
    let balance = wallet.balance();
    let count = wallet.utxos().len();
    guard.persist()?;

    info!(%address, utxos = count, balance, "wallet synchronized");
    Ok(balance)
}
