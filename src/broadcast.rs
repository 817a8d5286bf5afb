//! Network submission
//!
//! Transactions go to a node through `sendrawtransaction`. The only rejection
//! that is retried is the node's mempool ancestor limit
//! (`too-long-mempool-chain`); every other rejection is final.

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::bitcoin::consensus::encode::{deserialize, serialize_hex};
use crate::bitcoin::{Transaction, Txid};
use crate::error::{Error, Result};
use crate::wallet::WalletGuard;

/// Rejection reason that means "parents still unconfirmed, try later"
pub const MEMPOOL_CHAIN_LIMIT: &str = "too-long-mempool-chain";

/// Rejections meaning the node already has the transaction
const ALREADY_SUBMITTED: [&str; 3] = [
    "txn-already-in-mempool",
    "txn-already-known",
    "already in block chain",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("{message} (code {code})")]
    Rejected { code: i64, message: String },

    #[error("{0}")]
    Transport(String),
}

/// Submits raw transactions to a node.
pub trait NodeClient {
    fn send_raw_transaction(&self, raw_tx_hex: &str) -> Result<Txid, RpcError>;
}

impl<T: NodeClient + ?Sized> NodeClient for &T {
    fn send_raw_transaction(&self, raw_tx_hex: &str) -> Result<Txid, RpcError> {
        (**self).send_raw_transaction(raw_tx_hex)
    }
}

/// JSON-RPC 1.0 client for a dogecoind-compatible node
#[derive(Debug, Clone)]
pub struct NodeRpcClient {
    url: String,
    credentials: Option<(String, String)>,
    client: Client,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'static str,
    params: [&'a str; 1],
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl NodeRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        NodeRpcClient {
            url: url.into(),
            credentials: None,
            client: Client::new(),
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl NodeClient for NodeRpcClient {
    fn send_raw_transaction(&self, raw_tx_hex: &str) -> Result<Txid, RpcError> {
        let body = RpcRequest {
            jsonrpc: "1.0",
            id: "utxo-inscribe",
            method: "sendrawtransaction",
            params: [raw_tx_hex],
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request
            .send()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        // Nodes answer RPC errors with a non-2xx status and a JSON body
        let status = response.status();
        let response: RpcResponse = response
            .json()
            .map_err(|e| RpcError::Transport(format!("HTTP {}: {}", status, e)))?;

        if let Some(error) = response.error {
            return Err(RpcError::Rejected {
                code: error.code,
                message: error.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| RpcError::Transport("response has neither result nor error".into()))?;
        Txid::from_str(&result)
            .map_err(|e| RpcError::Transport(format!("invalid txid {:?}: {}", result, e)))
    }
}

/// Bounded fixed-delay retry for the mempool chain limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 600,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct Broadcaster<C> {
    client: C,
    retry: RetryPolicy,
}

impl<C: NodeClient> Broadcaster<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Broadcaster { client, retry }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Submit one transaction, retrying while the node reports congestion.
    pub fn broadcast(&self, tx: &Transaction) -> Result<Txid> {
        let txid = tx.compute_txid();
        let raw = serialize_hex(tx);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let message = match self.client.send_raw_transaction(&raw) {
                Ok(accepted) => {
                    info!(txid = %accepted, "transaction accepted");
                    return Ok(accepted);
                }
                Err(RpcError::Transport(message)) => return Err(Error::Transport(message)),
                Err(RpcError::Rejected { message, .. }) => message,
            };

            if ALREADY_SUBMITTED.iter().any(|known| message.contains(known)) {
                info!(%txid, %message, "transaction already known to the node");
                return Ok(txid);
            }
            if !message.contains(MEMPOOL_CHAIN_LIMIT) {
                return Err(Error::BroadcastRejected { txid, message });
            }
            if attempts >= max_attempts {
                return Err(Error::TransientCongestion { attempts, message });
            }

            warn!(
                %txid,
                attempt = attempts,
                max_attempts,
                "mempool chain limit reached, retrying"
            );
            thread::sleep(self.retry.delay);
        }
    }

    /// Submit a chain parent-first, persisting the ledger after every success.
    ///
    /// # Arguments
    /// * `guard` - The locked wallet; each accepted transaction is applied and persisted
    /// * `transactions` - The chain, parents before children
    /// * `pending_path` - Where to save the unsubmitted remainder on failure
    ///
    /// # Returns
    /// The accepted transaction ids in chain order. Only a rejection of the
    /// first transaction is returned unchanged. Any later failure, including a
    /// failed persist after an accepted broadcast, becomes
    /// [`Error::ChainPartiallySubmitted`] with the remainder saved to
    /// `pending_path`. An accepted transaction whose ledger update could not
    /// be persisted stays in the remainder so resuming applies it again.
    pub fn broadcast_chain(
        &self,
        guard: &mut WalletGuard<'_>,
        transactions: &[Transaction],
        pending_path: Option<&Path>,
    ) -> Result<Vec<Txid>> {
        let total = transactions.len();
        let mut txids = Vec::with_capacity(total);

        for (index, tx) in transactions.iter().enumerate() {
            let (submitted, error) = match self.broadcast(tx) {
                Ok(txid) => {
                    guard.wallet_mut().apply_transaction(tx);
                    match guard.persist() {
                        Ok(()) => {
                            info!(%txid, index, total, "chain transaction submitted");
                            txids.push(txid);
                            continue;
                        }
                        Err(error) => (index + 1, error),
                    }
                }
                Err(error) if index == 0 => return Err(error),
                Err(error) => (index, error),
            };

            let remaining = &transactions[index..];
            let pending = pending_path.and_then(|path| match write_pending(path, remaining) {
                Ok(()) => Some(path.to_path_buf()),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to save pending transactions"
                    );
                    None
                }
            });
            warn!(submitted, total, %error, "chain interrupted");
            return Err(Error::ChainPartiallySubmitted {
                submitted,
                total,
                pending,
                source: Box::new(error),
            });
        }

        Ok(txids)
    }
}

/// Write unsubmitted transactions as a JSON array of raw hex strings.
pub fn write_pending(path: &Path, transactions: &[Transaction]) -> Result<()> {
    let raw: Vec<String> = transactions.iter().map(serialize_hex).collect();
    let json = serde_json::to_vec_pretty(&raw)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)?;
    Ok(())
}

/// Read transactions saved by [`write_pending`]; a missing file is an empty list.
pub fn read_pending(path: &Path) -> Result<Vec<Transaction>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let raw: Vec<String> =
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    raw.iter()
        .map(|raw_tx| {
            hex::decode(raw_tx)
                .map_err(|e| e.to_string())
                .and_then(|bytes| deserialize(&bytes).map_err(|e| e.to_string()))
                .map_err(|e| {
                    Error::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("pending transaction in {}: {}", path.display(), e),
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funding::TransactionFunder;
    use crate::inscriptions::build_inscription_chain;
    use crate::networks::Network;
    use crate::test_utils::{fake_txid, test_key, test_wallet};
    use crate::wallet::WalletStore;
    use httpmock::{Method::POST, MockServer};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Node double answering from a fixed script of replies
    struct ScriptedNode {
        replies: RefCell<VecDeque<Result<Txid, RpcError>>>,
        calls: Cell<usize>,
    }

    impl ScriptedNode {
        fn new(replies: Vec<Result<Txid, RpcError>>) -> Self {
            ScriptedNode {
                replies: RefCell::new(replies.into()),
                calls: Cell::new(0),
            }
        }

        fn accepting() -> Self {
            Self::new(Vec::new())
        }
    }

    impl NodeClient for ScriptedNode {
        fn send_raw_transaction(&self, raw_tx_hex: &str) -> Result<Txid, RpcError> {
            self.calls.set(self.calls.get() + 1);
            self.replies.borrow_mut().pop_front().unwrap_or_else(|| {
                let tx: Transaction = deserialize(&hex::decode(raw_tx_hex).unwrap()).unwrap();
                Ok(tx.compute_txid())
            })
        }
    }

    fn rejected(message: &str) -> Result<Txid, RpcError> {
        Err(RpcError::Rejected {
            code: -26,
            message: message.to_string(),
        })
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    fn sample_tx() -> Transaction {
        let wallet = test_wallet(&[500_000_000]);
        let mut scratch = wallet.clone();
        build_inscription_chain(
            &mut scratch,
            &TransactionFunder::default(),
            wallet.address(),
            "text/plain",
            b"hello",
        )
        .unwrap()
        .into_transactions()
        .remove(0)
    }

    #[test]
    fn test_congestion_is_retried() {
        let tx = sample_tx();
        let node = ScriptedNode::new(vec![
            rejected("too-long-mempool-chain, too many unconfirmed ancestors [limit: 25]"),
            rejected("too-long-mempool-chain"),
        ]);
        let broadcaster = Broadcaster::new(&node, quick_retry(5));

        assert_eq!(broadcaster.broadcast(&tx).unwrap(), tx.compute_txid());
        assert_eq!(node.calls.get(), 3);
    }

    #[test]
    fn test_congestion_retry_is_bounded() {
        let tx = sample_tx();
        let node = ScriptedNode::new(vec![rejected("too-long-mempool-chain"); 10]);
        let broadcaster = Broadcaster::new(&node, quick_retry(3));

        let err = broadcaster.broadcast(&tx).unwrap_err();
        assert!(matches!(err, Error::TransientCongestion { attempts: 3, .. }));
        assert_eq!(node.calls.get(), 3);
    }

    #[test]
    fn test_other_rejections_surface_immediately() {
        let tx = sample_tx();
        let node = ScriptedNode::new(vec![rejected("mandatory-script-verify-flag-failed")]);
        let broadcaster = Broadcaster::new(&node, quick_retry(600));

        match broadcaster.broadcast(&tx).unwrap_err() {
            Error::BroadcastRejected { txid, message } => {
                assert_eq!(txid, tx.compute_txid());
                assert_eq!(message, "mandatory-script-verify-flag-failed");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(node.calls.get(), 1);
    }

    #[test]
    fn test_already_known_counts_as_success() {
        let tx = sample_tx();
        let node = ScriptedNode::new(vec![rejected("txn-already-in-mempool")]);
        let broadcaster = Broadcaster::new(&node, quick_retry(1));
        assert_eq!(broadcaster.broadcast(&tx).unwrap(), tx.compute_txid());
    }

    #[test]
    fn test_transport_errors_are_not_retried() {
        let tx = sample_tx();
        let node = ScriptedNode::new(vec![Err(RpcError::Transport("connection refused".into()))]);
        let broadcaster = Broadcaster::new(&node, quick_retry(5));
        assert!(matches!(broadcaster.broadcast(&tx), Err(Error::Transport(_))));
        assert_eq!(node.calls.get(), 1);
    }

    fn funded_store(dir: &tempfile::TempDir) -> WalletStore {
        let store = WalletStore::new(dir.path().join(".wallet.json"), Network::Dogecoin);
        store.create(test_key()).unwrap();
        let mut guard = store.lock().unwrap();
        let utxos = test_wallet(&[5_000_000_000]).utxos().to_vec();
        guard.wallet_mut().apply(&[], utxos);
        guard.persist().unwrap();
        drop(guard);
        store
    }

    fn build_chain(store: &WalletStore, len: usize) -> Vec<Transaction> {
        let mut scratch = store.load().unwrap();
        let source = *scratch.address();
        build_inscription_chain(
            &mut scratch,
            &TransactionFunder::default(),
            &source,
            "text/plain",
            &vec![b'x'; len],
        )
        .unwrap()
        .into_transactions()
    }

    #[test]
    fn test_chain_persists_after_each_submission() {
        let dir = tempfile::tempdir().unwrap();
        let store = funded_store(&dir);
        let chain = build_chain(&store, 3000);
        let node = ScriptedNode::accepting();
        let broadcaster = Broadcaster::new(&node, quick_retry(1));

        let mut guard = store.lock().unwrap();
        let txids = broadcaster.broadcast_chain(&mut guard, &chain, None).unwrap();
        drop(guard);

        assert_eq!(txids.len(), chain.len());
        let wallet = store.load().unwrap();
        let last = chain.last().unwrap().compute_txid();
        assert!(wallet.utxos().iter().all(|u| u.txid == last));
    }

    #[test]
    fn test_chain_failure_midway_saves_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let store = funded_store(&dir);
        let chain = build_chain(&store, 3000);
        assert_eq!(chain.len(), 4);

        let node = ScriptedNode::new(vec![
            Ok(chain[0].compute_txid()),
            Ok(chain[1].compute_txid()),
            rejected("bad-txns-inputs-spent"),
        ]);
        let broadcaster = Broadcaster::new(&node, quick_retry(1));
        let pending_path = dir.path().join("pending-txs.json");

        let mut guard = store.lock().unwrap();
        let err = broadcaster
            .broadcast_chain(&mut guard, &chain, Some(pending_path.as_path()))
            .unwrap_err();
        drop(guard);

        match err {
            Error::ChainPartiallySubmitted {
                submitted,
                total,
                pending,
                source,
            } => {
                assert_eq!((submitted, total), (2, 4));
                assert_eq!(pending.as_deref(), Some(pending_path.as_path()));
                assert!(matches!(*source, Error::BroadcastRejected { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }

        assert_eq!(read_pending(&pending_path).unwrap(), chain[2..].to_vec());
        // ledger reflects exactly the two submitted transactions
        let wallet = store.load().unwrap();
        assert_eq!(wallet.utxos().len(), 1);
        assert_eq!(wallet.utxos()[0].txid, chain[1].compute_txid());
    }

    #[test]
    fn test_chain_failure_at_start_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = funded_store(&dir);
        let before = store.load().unwrap().utxos().to_vec();
        let chain = build_chain(&store, 3000);

        let node = ScriptedNode::new(vec![rejected("min relay fee not met")]);
        let broadcaster = Broadcaster::new(&node, quick_retry(1));
        let pending_path = dir.path().join("pending-txs.json");

        let mut guard = store.lock().unwrap();
        let err = broadcaster
            .broadcast_chain(&mut guard, &chain, Some(pending_path.as_path()))
            .unwrap_err();
        drop(guard);

        assert!(matches!(err, Error::BroadcastRejected { .. }));
        assert!(err.is_nothing_submitted());
        assert!(!pending_path.exists());
        assert_eq!(store.load().unwrap().utxos(), before.as_slice());
    }

    #[test]
    fn test_persist_failure_after_acceptance_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = funded_store(&dir);
        let chain = build_chain(&store, 3000);
        let before = store.load().unwrap().utxos().to_vec();

        // the atomic write goes through `<wallet>.tmp`, which cannot be a file now
        fs::create_dir(dir.path().join(".wallet.json.tmp")).unwrap();
        let node = ScriptedNode::accepting();
        let broadcaster = Broadcaster::new(&node, quick_retry(1));
        let pending_path = dir.path().join("pending-txs.json");

        let mut guard = store.lock().unwrap();
        let err = broadcaster
            .broadcast_chain(&mut guard, &chain, Some(pending_path.as_path()))
            .unwrap_err();
        drop(guard);

        assert_eq!(node.calls.get(), 1);
        assert!(!err.is_nothing_submitted());
        match err {
            Error::ChainPartiallySubmitted {
                submitted,
                total,
                pending,
                source,
            } => {
                assert_eq!((submitted, total), (1, 4));
                assert_eq!(pending.as_deref(), Some(pending_path.as_path()));
                assert!(matches!(*source, Error::Io(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }
        // the accepted transaction is kept so a resume re-applies it
        assert_eq!(read_pending(&pending_path).unwrap(), chain);
        assert_eq!(store.load().unwrap().utxos(), before.as_slice());
    }

    #[test]
    fn test_missing_pending_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_pending(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn test_rpc_client_sends_authenticated_request() {
        let server = MockServer::start();
        let txid = fake_txid(7);
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/")
                .header("authorization", "Basic dXNlcjpwYXNz")
                .json_body_partial(r#"{"method": "sendrawtransaction", "params": ["deadbeef"]}"#);
            then.status(200).json_body(serde_json::json!({
                "result": txid.to_string(),
                "error": null,
                "id": "utxo-inscribe"
            }));
        });

        let client = NodeRpcClient::new(server.url("/")).with_credentials("user", "pass");
        assert_eq!(client.send_raw_transaction("deadbeef").unwrap(), txid);
        mock.assert();
    }

    #[test]
    fn test_rpc_client_reports_node_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(500).json_body(serde_json::json!({
                "result": null,
                "error": { "code": -26, "message": "too-long-mempool-chain" },
                "id": "utxo-inscribe"
            }));
        });

        let client = NodeRpcClient::new(server.url("/"));
        assert_eq!(
            client.send_raw_transaction("00").unwrap_err(),
            RpcError::Rejected {
                code: -26,
                message: "too-long-mempool-chain".into()
            }
        );
    }

    #[test]
    fn test_rpc_client_non_json_is_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(401).body("Unauthorized");
        });

        let client = NodeRpcClient::new(server.url("/"));
        assert!(matches!(
            client.send_raw_transaction("00"),
            Err(RpcError::Transport(_))
        ));
    }
}
