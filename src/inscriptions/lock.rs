//! Hash-locked commitments to partial scripts
//!
//! Each partial script is committed to by a P2SH output whose redeem script is
//! ```text
//! <pubkey> OP_CHECKSIGVERIFY OP_DROP x n OP_TRUE
//! ```
//! where `n` is the number of chunks in the partial. The spending transaction
//! has to replay the partial's chunks in its unlock script, which is how the
//! envelope reaches the chain.

use crate::bitcoin::opcodes::all::{OP_CHECKSIGVERIFY, OP_DROP};
use crate::bitcoin::opcodes::OP_TRUE;
use crate::bitcoin::{
    Amount, CompressedPublicKey, Script, ScriptBuf, ScriptHash, Transaction, TxOut,
};
use crate::error::Result;
use crate::keys::WalletKey;

use super::chunk::{self, Chunk};
use super::partition::PartialScript;

/// Value of each intermediate P2SH commitment output
pub const LOCK_OUTPUT_VALUE: u64 = 100_000;

/// DER signature (at most 72 bytes) plus the sighash type byte
pub const MAX_SIGNATURE_LEN: usize = 73;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockScript {
    partial: PartialScript,
    script: ScriptBuf,
}

impl LockScript {
    pub fn new(public_key: &CompressedPublicKey, partial: PartialScript) -> Self {
        let mut chunks = Vec::with_capacity(partial.len() + 3);
        chunks.push(Chunk::bytes(public_key.to_bytes()));
        chunks.push(Chunk::Op(OP_CHECKSIGVERIFY));
        chunks.extend(std::iter::repeat(Chunk::Op(OP_DROP)).take(partial.len()));
        chunks.push(Chunk::Op(OP_TRUE));

        LockScript {
            script: chunk::to_script(&chunks),
            partial,
        }
    }

    pub fn partial(&self) -> &PartialScript {
        &self.partial
    }

    pub fn as_script(&self) -> &Script {
        &self.script
    }

    /// HASH160 of the serialized lock script
    pub fn commitment(&self) -> ScriptHash {
        self.script.script_hash()
    }

    pub fn p2sh_output(&self, value: u64) -> TxOut {
        TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::new_p2sh(&self.commitment()),
        }
    }

    /// Unlock script: `<partial chunks...> <signature> <lock script>`
    pub fn unlock_script(&self, signature: &[u8]) -> ScriptBuf {
        let mut chunks = self.partial.chunks().to_vec();
        chunks.push(Chunk::bytes(signature));
        chunks.push(Chunk::bytes(self.script.as_bytes()));
        chunk::to_script(&chunks)
    }

    /// Unlock script with a maximum-length dummy signature, for fee estimation
    pub fn placeholder_unlock_script(&self) -> ScriptBuf {
        self.unlock_script(&[0u8; MAX_SIGNATURE_LEN])
    }

    /// Sign `input_index` of `tx` against this lock and attach the unlock script.
    pub fn unlock_input(
        &self,
        tx: &mut Transaction,
        input_index: usize,
        key: &WalletKey,
    ) -> Result<()> {
        let signature = key.sign_legacy_input(tx, input_index, &self.script)?;
        let unlock = self.unlock_script(&signature);
        tx.input[input_index].script_sig = unlock;
        Ok(())
    }
}
