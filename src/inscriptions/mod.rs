//! Doginals-style inscriptions
//!
//! A payload is encoded into an envelope of script chunks, partitioned across
//! a chain of legacy transactions and revealed through P2SH unlock scripts.

mod chain;
pub mod chunk;
mod envelope;
pub mod lock;
mod partition;

pub use chain::{build_inscription_chain, extract_inscription, TransactionChain};
pub use chunk::Chunk;
pub use envelope::{decode_envelope, Envelope, Inscription, MAX_PART_LEN, PROTOCOL_MARKER};
pub use lock::{LockScript, LOCK_OUTPUT_VALUE};
pub use partition::{partition, partition_with_ceiling, PartialScript, MAX_PAYLOAD_LEN};
