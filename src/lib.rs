mod address;
pub mod broadcast;
pub mod engine;
mod error;
pub mod funding;
pub mod inscriptions;
pub mod keys;
mod networks;
pub mod sync;
#[cfg(test)]
mod test_utils;
pub mod wallet;

// re-export bitcoin so callers use the same primitives as the engine
pub use ::bitcoin;

pub use address::{
    from_output_script_with_network, to_output_script_with_network, Address, AddressPayload,
};
pub use broadcast::{Broadcaster, NodeClient, NodeRpcClient, RetryPolicy, RpcError};
pub use engine::{Engine, EngineConfig};
pub use error::{EnvelopeError, Error, Result};
pub use funding::{FeeRate, TransactionFunder};
pub use keys::WalletKey;
pub use networks::Network;
pub use sync::{DogechainIndexer, UtxoIndexer};
pub use wallet::{Utxo, Wallet, WalletStore};
