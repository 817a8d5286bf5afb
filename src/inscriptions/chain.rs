//! Inscription chain construction
//!
//! One transaction per partial script creates a P2SH lock committing to it.
//! Each following transaction spends the previous lock (output 0), replaying
//! that partial in its unlock script. A final transaction spends the last
//! lock and pays the destination.

use tracing::debug;

use crate::address::Address;
use crate::bitcoin::{Amount, OutPoint, Transaction, TxOut, Txid};
use crate::error::{EnvelopeError, Result};
use crate::funding::{Draft, TransactionFunder};
use crate::wallet::Wallet;

use super::chunk::Chunk;
use super::envelope::{decode_envelope, Envelope, Inscription};
use super::lock::{LockScript, LOCK_OUTPUT_VALUE};
use super::partition::partition;

/// Ordered, parent-first list of dependent transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionChain {
    transactions: Vec<Transaction>,
}

impl TransactionChain {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        TransactionChain { transactions }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Id of the transaction paying the destination.
    pub fn final_txid(&self) -> Option<Txid> {
        self.transactions.last().map(Transaction::compute_txid)
    }
}

/// Build the whole chain, applying every transaction to `wallet` as it is built.
///
/// Nothing is broadcast. On error `wallet` may hold a partially applied
/// ledger, so callers should build against a copy.
///
/// # Arguments
/// * `wallet` - Ledger funding the chain; its key signs the lock inputs
/// * `funder` - Fee rate and dust policy for every transaction
/// * `destination` - Address paid by the final transaction
/// * `content_type` - MIME type of the inscription (e.g., "text/plain", "image/png")
/// * `data` - The inscription data
///
/// # Returns
/// The signed chain: one P2SH lock transaction per partial script, then the
/// transfer to `destination`
pub fn build_inscription_chain(
    wallet: &mut Wallet,
    funder: &TransactionFunder,
    destination: &Address,
    content_type: &str,
    data: &[u8],
) -> Result<TransactionChain> {
    let key = *wallet.key();
    let partials = partition(Envelope::new(content_type, data)?)?;
    let mut transactions = Vec::with_capacity(partials.len() + 1);
    let mut previous: Option<(LockScript, OutPoint)> = None;

    for partial in partials {
        let lock = LockScript::new(key.public_key(), partial);
        let mut draft = Draft::new();
        if let Some((prev_lock, outpoint)) = &previous {
            draft.add_input(*outpoint, LOCK_OUTPUT_VALUE, prev_lock.placeholder_unlock_script());
        }
        draft.add_output(lock.p2sh_output(LOCK_OUTPUT_VALUE));

        let mut tx = funder.fund(wallet, draft)?.tx;
        if let Some((prev_lock, _)) = &previous {
            prev_lock.unlock_input(&mut tx, 0, &key)?;
        }
        wallet.apply_transaction(&tx);

        let txid = tx.compute_txid();
        debug!(
            %txid,
            index = transactions.len(),
            chunks = lock.partial().len(),
            size = tx.total_size(),
            "built lock transaction"
        );
        previous = Some((lock, OutPoint { txid, vout: 0 }));
        transactions.push(tx);
    }

    let (last_lock, outpoint) = previous
        .ok_or_else(|| EnvelopeError::Malformed("envelope produced no partial scripts".into()))?;
    let mut draft = Draft::new();
    draft.add_input(outpoint, LOCK_OUTPUT_VALUE, last_lock.placeholder_unlock_script());
    draft.add_output(TxOut {
        value: Amount::from_sat(LOCK_OUTPUT_VALUE),
        script_pubkey: destination.script_pubkey(),
    });

    let mut tx = funder.fund(wallet, draft)?.tx;
    last_lock.unlock_input(&mut tx, 0, &key)?;
    wallet.apply_transaction(&tx);
    debug!(txid = %tx.compute_txid(), %destination, "built final transaction");
    transactions.push(tx);

    Ok(TransactionChain::new(transactions))
}

/// Read the inscription back out of a chain's unlock scripts.
///
/// # Arguments
/// * `transactions` - A complete chain as returned by [`build_inscription_chain`]
///
/// # Returns
/// The content type and body carried by the envelope
pub fn extract_inscription(transactions: &[Transaction]) -> Result<Inscription, EnvelopeError> {
    let mut chunks = Vec::new();
    for tx in transactions.iter().skip(1) {
        let input = tx
            .input
            .first()
            .ok_or_else(|| EnvelopeError::Malformed("transaction has no inputs".into()))?;
        let mut pushes = input
            .script_sig
            .instructions()
            .map(|i| i.map(Chunk::from_instruction))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EnvelopeError::Malformed(format!("unlock script: {}", e)))?;
        // Trailing signature and lock script
        if pushes.len() < 2 {
            return Err(EnvelopeError::Malformed(
                "unlock script is missing its signature and lock".into(),
            ));
        }
        pushes.truncate(pushes.len() - 2);
        chunks.extend(pushes);
    }
    decode_envelope(&chunks)
}
