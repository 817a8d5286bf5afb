use std::path::PathBuf;

use thiserror::Error;

use crate::bitcoin::Txid;

/// Failures while encoding or partitioning an inscription envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("content type is {len} bytes, exceeds the {max}-byte script element limit")]
    ContentTypeTooLong { len: usize, max: usize },

    #[error("payload needs {parts} parts, at most {max} can be counted")]
    PayloadTooLarge { parts: usize, max: usize },

    #[error("chunk pair of {size} bytes cannot fit a {ceiling}-byte partial script")]
    OversizedPair { size: usize, ceiling: usize },

    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Error type for every engine operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid private key or recovery phrase: {0}")]
    InvalidKeyOrPhrase(String),

    #[error("not enough funds: wallet holds {available} koinu, {required} koinu needed")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("transaction {txid} rejected: {message}")]
    BroadcastRejected { txid: Txid, message: String },

    #[error("node still reports congestion after {attempts} attempts: {message}")]
    TransientCongestion { attempts: u32, message: String },

    #[error("cannot split the wallet into {0} outputs")]
    InvalidSplitCount(usize),

    #[error("wallet already exists at {}", .0.display())]
    WalletAlreadyExists(PathBuf),

    #[error("no wallet found at {}", .0.display())]
    WalletNotFound(PathBuf),

    #[error("wallet at {} is unreadable: {reason}", path.display())]
    WalletCorrupt { path: PathBuf, reason: String },

    #[error(
        "wallet at {} is locked by {}; delete {} if that process is gone",
        path.display(),
        lock_holder(*pid),
        lock.display()
    )]
    WalletBusy {
        path: PathBuf,
        lock: PathBuf,
        pid: Option<u32>,
    },

    #[error("unsubmitted transactions are waiting in {}; resume them first", .0.display())]
    PendingChain(PathBuf),

    #[error("chain partially submitted: {submitted} of {total} transactions broadcast")]
    ChainPartiallySubmitted {
        submitted: usize,
        total: usize,
        pending: Option<PathBuf>,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("node request failed: {0}")]
    Transport(String),

    #[error("indexer request failed: {0}")]
    Indexer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_address(address: &str, reason: impl ToString) -> Self {
        Error::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    /// `true` when nothing from the failed operation reached the network.
    pub fn is_nothing_submitted(&self) -> bool {
        !matches!(self, Error::ChainPartiallySubmitted { .. })
    }
}

fn lock_holder(pid: Option<u32>) -> String {
    match pid {
        Some(pid) => format!("process {}", pid),
        None => "another operation".to_string(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
