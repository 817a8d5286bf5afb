//! Wallet persistence
//!
//! The wallet record lives in a JSON file. Every mutating operation holds a
//! [`WalletGuard`], which owns an exclusive `<wallet>.lock` file for its whole
//! lifetime, so two operations can never fund from the same UTXO set.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::keys::WalletKey;
use crate::networks::Network;

use super::{Utxo, Wallet};

/// On-disk wallet shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub privkey: String,
    pub address: String,
    #[serde(default)]
    pub utxos: Vec<Utxo>,
}

impl Wallet {
    pub fn to_record(&self) -> WalletRecord {
        WalletRecord {
            privkey: self.key.to_wif(self.network),
            address: self.address.to_string(),
            utxos: self.utxos.clone(),
        }
    }

    pub fn from_record(record: WalletRecord, network: Network) -> std::result::Result<Self, String> {
        let key = WalletKey::from_wif(&record.privkey, network).map_err(|e| e.to_string())?;
        let wallet = Wallet::with_utxos(key, network, Vec::new());

        if wallet.address.to_string() != record.address {
            return Err(format!(
                "address {} does not match the private key (expected {})",
                record.address, wallet.address
            ));
        }
        if let Some(foreign) = record.utxos.iter().find(|u| !wallet.owns_script(&u.script)) {
            return Err(format!(
                "utxo {}:{} does not pay the wallet address",
                foreign.txid, foreign.vout
            ));
        }

        Ok(Wallet::with_utxos(key, network, record.utxos))
    }
}

#[derive(Debug, Clone)]
pub struct WalletStore {
    path: PathBuf,
    network: Network,
}

impl WalletStore {
    pub fn new(path: impl Into<PathBuf>, network: Network) -> Self {
        WalletStore {
            path: path.into(),
            network,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a fresh wallet for `key`. Never overwrites an existing record.
    pub fn create(&self, key: WalletKey) -> Result<Wallet> {
        let wallet = Wallet::new(key, self.network);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::WalletAlreadyExists(self.path.clone()),
                _ => Error::Io(e),
            })?;
        file.write_all(&self.encode(&wallet)?)?;
        file.sync_all()?;
        Ok(wallet)
    }

    /// Read the wallet without taking the lock.
    pub fn load(&self) -> Result<Wallet> {
        let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::WalletNotFound(self.path.clone()),
            _ => Error::Io(e),
        })?;
        let record: WalletRecord =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e.to_string()))?;
        Wallet::from_record(record, self.network).map_err(|reason| self.corrupt(reason))
    }

    /// Take the exclusive lock and load the wallet.
    pub fn lock(&self) -> Result<WalletGuard<'_>> {
        let lock = LockFile::acquire(self.lock_path(), &self.path)?;
        let wallet = self.load()?;
        debug!(path = %self.path.display(), "wallet locked");
        Ok(WalletGuard {
            store: self,
            wallet,
            _lock: lock,
        })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn write(&self, wallet: &Wallet) -> Result<()> {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, self.encode(wallet)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn encode(&self, wallet: &Wallet) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&wallet.to_record())
            .map_err(|e| self.corrupt(format!("failed to encode wallet: {}", e)))
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::WalletCorrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Exclusive access to a loaded wallet; the lock is released on drop.
#[derive(Debug)]
pub struct WalletGuard<'a> {
    store: &'a WalletStore,
    wallet: Wallet,
    _lock: LockFile,
}

impl WalletGuard<'_> {
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut Wallet {
        &mut self.wallet
    }

    pub fn persist(&self) -> Result<()> {
        self.store.write(&self.wallet)
    }
}

#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf, wallet_path: &Path) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(LockFile { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(&path)
                    .ok()
                    .and_then(|content| content.trim().parse().ok());
                Err(Error::WalletBusy {
                    path: wallet_path.to_path_buf(),
                    lock: path,
                    pid,
                })
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release wallet lock");
        }
    }
}
