//! Engine configuration from flags and environment variables

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use utxo_inscribe::funding::DEFAULT_FEE_PER_KB;
use utxo_inscribe::sync::DOGECHAIN_API;
use utxo_inscribe::{
    DogechainIndexer, Engine, EngineConfig, FeeRate, Network, NodeRpcClient, RetryPolicy,
};

pub type CliEngine = Engine<NodeRpcClient, DogechainIndexer>;

#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Use Dogecoin testnet
    #[arg(long, env = "TESTNET", global = true)]
    pub testnet: bool,

    /// Fee rate in koinu per started kilobyte
    #[arg(long, env = "FEE_PER_KB", default_value_t = DEFAULT_FEE_PER_KB, global = true)]
    pub fee_per_kb: u64,

    /// Wallet file
    #[arg(long, env = "WALLET", default_value = ".wallet.json", global = true)]
    pub wallet: PathBuf,

    /// File holding the unsubmitted part of an interrupted chain
    #[arg(long, env = "PENDING_TXS", default_value = "pending-txs.json", global = true)]
    pub pending_txs: PathBuf,

    /// Node JSON-RPC endpoint (defaults to the local node port for the network)
    #[arg(long, env = "NODE_RPC_URL", global = true)]
    pub node_rpc_url: Option<String>,

    #[arg(long, env = "NODE_RPC_USER", global = true)]
    pub node_rpc_user: Option<String>,

    #[arg(long, env = "NODE_RPC_PASS", hide_env_values = true, global = true)]
    pub node_rpc_pass: Option<String>,

    /// UTXO indexer API root (mainnet defaults to dogechain.info)
    #[arg(long, env = "INDEXER_URL", global = true)]
    pub indexer_url: Option<String>,

    /// Delay between retries while the node reports too-long-mempool-chain
    #[arg(long, env = "BROADCAST_RETRY_DELAY_MS", default_value_t = 1000, global = true)]
    pub broadcast_retry_delay_ms: u64,

    #[arg(long, env = "BROADCAST_MAX_ATTEMPTS", default_value_t = 600, global = true)]
    pub broadcast_max_attempts: u32,
}

impl EngineArgs {
    pub fn network(&self) -> Network {
        Network::from_testnet_flag(self.testnet)
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            network: self.network(),
            wallet_path: self.wallet.clone(),
            pending_path: self.pending_txs.clone(),
            fee_rate: FeeRate::from_koinu_per_kb(self.fee_per_kb),
            retry: RetryPolicy {
                max_attempts: self.broadcast_max_attempts,
                delay: Duration::from_millis(self.broadcast_retry_delay_ms),
            },
        }
    }

    pub fn node_client(&self) -> NodeRpcClient {
        let url = self.node_rpc_url.clone().unwrap_or_else(|| {
            format!("http://127.0.0.1:{}", self.network().default_rpc_port())
        });
        let client = NodeRpcClient::new(url);
        match (&self.node_rpc_user, &self.node_rpc_pass) {
            (Some(user), password) => {
                client.with_credentials(user, password.clone().unwrap_or_default())
            }
            (None, _) => client,
        }
    }

    pub fn indexer(&self) -> Option<DogechainIndexer> {
        match (&self.indexer_url, self.network()) {
            (Some(url), _) => Some(DogechainIndexer::new(url.clone())),
            (None, Network::Dogecoin) => Some(DogechainIndexer::new(DOGECHAIN_API)),
            (None, Network::DogecoinTestnet) => None,
        }
    }

    pub fn engine(&self) -> CliEngine {
        Engine::new(self.config(), self.node_client(), self.indexer())
    }
}
