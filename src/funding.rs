//! Transaction funding
//!
//! Funding runs in two phases. Selection adds wallet UTXOs in ledger order
//! until the inputs cover the outputs plus a fee computed from the estimated
//! size of the finished transaction. Signing then fills in every wallet input
//! once. Inputs attached by the caller (lock inputs) keep the placeholder
//! scriptSig they were drafted with and are signed by the caller afterwards.

use tracing::debug;

use crate::bitcoin::{
    absolute, transaction, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Witness,
};
use crate::error::{Error, Result};
use crate::inscriptions::chunk::{self, Chunk};
use crate::inscriptions::lock::MAX_SIGNATURE_LEN;
use crate::wallet::{Utxo, Wallet};

/// Default fee rate in koinu per started kilobyte (1 DOGE/kB)
pub const DEFAULT_FEE_PER_KB: u64 = 100_000_000;

/// Smallest change output worth creating; smaller change goes to the fee
pub const DUST_LIMIT: u64 = 100_000;

/// Linear fee rate charged per started 1000 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const fn from_koinu_per_kb(koinu: u64) -> Self {
        FeeRate(koinu)
    }

    pub fn koinu_per_kb(self) -> u64 {
        self.0
    }

    /// `ceil(size / 1000) * rate`
    pub fn fee_for_size(self, size: usize) -> u64 {
        (size as u64).div_ceil(1000).saturating_mul(self.0)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        FeeRate(DEFAULT_FEE_PER_KB)
    }
}

/// A transaction before wallet inputs and change are attached
#[derive(Debug, Clone, Default)]
pub struct Draft {
    inputs: Vec<TxIn>,
    input_value: u64,
    outputs: Vec<TxOut>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an input the wallet does not own.
    ///
    /// `placeholder_script_sig` must be at least as large as the final
    /// scriptSig so the fee estimate holds after signing.
    pub fn add_input(&mut self, outpoint: OutPoint, value: u64, placeholder_script_sig: ScriptBuf) {
        self.inputs.push(unsigned_input(outpoint, placeholder_script_sig));
        self.input_value += value;
    }

    pub fn add_output(&mut self, output: TxOut) {
        self.outputs.push(output);
    }

    fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value.to_sat()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct FundedTransaction {
    pub tx: Transaction,
    pub fee: u64,
    /// Change paid back to the wallet, `None` when it was below the dust limit
    pub change: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TransactionFunder {
    fee_rate: FeeRate,
    dust_limit: u64,
}

impl Default for TransactionFunder {
    fn default() -> Self {
        Self::new(FeeRate::default())
    }
}

impl TransactionFunder {
    pub fn new(fee_rate: FeeRate) -> Self {
        TransactionFunder {
            fee_rate,
            dust_limit: DUST_LIMIT,
        }
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    /// Add wallet UTXOs in ledger order until the draft is covered.
    ///
    /// # Arguments
    /// * `wallet` - Ledger to select from and key to sign with; it is not modified
    /// * `draft` - Outputs to pay and any pre-attached foreign inputs
    ///
    /// # Returns
    /// The transaction with every wallet input signed, its fee and change, or
    /// [`Error::InsufficientFunds`] once the UTXO set is exhausted. Foreign
    /// inputs keep their placeholder scriptSig for the caller to replace.
    pub fn fund(&self, wallet: &Wallet, draft: Draft) -> Result<FundedTransaction> {
        self.fund_inner(wallet, draft, false)
    }

    /// Spend every wallet UTXO, leaving everything above the outputs and fee as change.
    pub fn fund_all(&self, wallet: &Wallet, draft: Draft) -> Result<FundedTransaction> {
        self.fund_inner(wallet, draft, true)
    }

    fn fund_inner(&self, wallet: &Wallet, draft: Draft, sweep: bool) -> Result<FundedTransaction> {
        let change_script = wallet.output_script();
        let output_value = draft.output_value();
        let mut input_value = draft.input_value;

        let mut tx = Transaction {
            version: transaction::Version::ONE,
            lock_time: absolute::LockTime::ZERO,
            input: draft.inputs,
            output: draft.outputs,
        };
        let foreign_inputs = tx.input.len();

        // Selection: the estimate always counts a change output
        tx.output.push(TxOut {
            value: Amount::ZERO,
            script_pubkey: change_script,
        });
        let mut selected: Vec<&Utxo> = Vec::new();
        let mut candidates = wallet.utxos().iter();
        let mut fee = self.fee_rate.fee_for_size(tx.total_size());

        loop {
            let covered = !tx.input.is_empty() && input_value >= output_value.saturating_add(fee);
            if covered && !sweep {
                break;
            }
            let Some(utxo) = candidates.next() else {
                if covered {
                    break;
                }
                return Err(Error::InsufficientFunds {
                    available: draft.input_value + wallet.balance(),
                    required: output_value.saturating_add(fee),
                });
            };
            tx.input
                .push(unsigned_input(utxo.outpoint(), p2pkh_placeholder_script_sig()));
            input_value += utxo.satoshis;
            selected.push(utxo);
            fee = self.fee_rate.fee_for_size(tx.total_size());
        }

        let change = input_value - output_value - fee;
        let change = if change >= self.dust_limit {
            if let Some(output) = tx.output.last_mut() {
                output.value = Amount::from_sat(change);
            }
            Some(change)
        } else {
            tx.output.pop();
            None
        };
        debug!(
            inputs = tx.input.len(),
            selected = selected.len(),
            fee,
            change = change.unwrap_or(0),
            "funded transaction"
        );

        // Signing: every wallet input once, over the final outputs
        for (offset, utxo) in selected.iter().enumerate() {
            let index = foreign_inputs + offset;
            let signature = wallet.key().sign_legacy_input(&tx, index, &utxo.script)?;
            tx.input[index].script_sig = chunk::to_script(&[
                Chunk::bytes(signature),
                Chunk::bytes(wallet.key().public_key().to_bytes()),
            ]);
        }

        let fee = input_value - output_value - change.unwrap_or(0);
        Ok(FundedTransaction { tx, fee, change })
    }
}

fn unsigned_input(previous_output: OutPoint, script_sig: ScriptBuf) -> TxIn {
    TxIn {
        previous_output,
        script_sig,
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

/// `<max signature> <compressed pubkey>`
fn p2pkh_placeholder_script_sig() -> ScriptBuf {
    chunk::to_script(&[
        Chunk::bytes(vec![0u8; MAX_SIGNATURE_LEN]),
        Chunk::bytes(vec![0u8; 33]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::keys::WalletKey;
    use crate::test_utils::{fake_txid, test_wallet, verify_legacy_signature};
    use rstest::rstest;

    const COIN: u64 = 100_000_000;

    fn payment(value: u64) -> Draft {
        let to = Address::p2pkh(WalletKey::generate().public_key(), Default::default());
        let mut draft = Draft::new();
        draft.add_output(TxOut {
            value: Amount::from_sat(value),
            script_pubkey: to.script_pubkey(),
        });
        draft
    }

    fn input_total(wallet: &Wallet, tx: &Transaction) -> u64 {
        tx.input
            .iter()
            .filter_map(|i| wallet.utxos().iter().find(|u| u.outpoint() == i.previous_output))
            .map(|u| u.satoshis)
            .sum()
    }

    #[rstest]
    #[case(0, 1)]
    #[case(999, 1)]
    #[case(1000, 1)]
    #[case(1001, 2)]
    #[case(2500, 3)]
    fn test_fee_rounds_up_per_kb(#[case] size: usize, #[case] kbs: u64) {
        let rate = FeeRate::from_koinu_per_kb(7);
        let expected = if size == 0 { 0 } else { kbs * 7 };
        assert_eq!(rate.fee_for_size(size), expected);
    }

    #[test]
    fn test_funding_covers_outputs_and_fee() {
        let wallet = test_wallet(&[COIN / 2, COIN, 5 * COIN]);
        let funder = TransactionFunder::default();
        let funded = funder.fund(&wallet, payment(2 * COIN)).unwrap();

        let tx = &funded.tx;
        let outputs: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        assert_eq!(input_total(&wallet, tx), outputs + funded.fee);
        assert!(funded.fee >= funder.fee_rate().fee_for_size(tx.total_size()));

        // Ledger order: all three are needed for 2 DOGE plus 1 DOGE fee
        assert_eq!(tx.input.len(), 3);
        assert_eq!(funded.change, Some(5 * COIN + COIN + COIN / 2 - 2 * COIN - COIN));
        assert_eq!(tx.output[1].script_pubkey, wallet.output_script());
    }

    #[test]
    fn test_stops_once_covered() {
        let wallet = test_wallet(&[10 * COIN, 10 * COIN]);
        let funded = TransactionFunder::default()
            .fund(&wallet, payment(COIN))
            .unwrap();
        assert_eq!(funded.tx.input.len(), 1);
        assert_eq!(funded.tx.input[0].previous_output.txid, fake_txid(1));
    }

    #[test]
    fn test_dust_change_goes_to_fee() {
        let wallet = test_wallet(&[2 * COIN + 500]);
        let funded = TransactionFunder::default()
            .fund(&wallet, payment(COIN))
            .unwrap();

        assert_eq!(funded.change, None);
        assert_eq!(funded.tx.output.len(), 1);
        assert_eq!(funded.fee, COIN + 500);
    }

    #[test]
    fn test_insufficient_funds_reports_amounts() {
        let wallet = test_wallet(&[COIN, COIN]);
        let err = TransactionFunder::default()
            .fund(&wallet, payment(5 * COIN))
            .unwrap_err();

        match err {
            Error::InsufficientFunds {
                available,
                required,
            } => {
                assert_eq!(available, 2 * COIN);
                assert!(required > 5 * COIN);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_empty_wallet_cannot_fund() {
        let wallet = test_wallet(&[]);
        assert!(matches!(
            TransactionFunder::default().fund(&wallet, payment(1)),
            Err(Error::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn test_wallet_inputs_are_signed() {
        let wallet = test_wallet(&[3 * COIN, 3 * COIN]);
        let funded = TransactionFunder::default()
            .fund(&wallet, payment(4 * COIN))
            .unwrap();

        for (index, input) in funded.tx.input.iter().enumerate() {
            let pushes: Vec<_> = input
                .script_sig
                .instructions()
                .map(|i| Chunk::from_instruction(i.unwrap()))
                .collect();
            assert_eq!(pushes.len(), 2);
            assert_eq!(
                pushes[1].as_bytes(),
                Some(&wallet.key().public_key().to_bytes()[..])
            );
            assert!(verify_legacy_signature(
                &funded.tx,
                index,
                &wallet.output_script(),
                pushes[0].as_bytes().unwrap(),
                wallet.key().public_key(),
            ));
        }
    }

    #[test]
    fn test_foreign_input_counts_toward_funding() {
        let wallet = test_wallet(&[10 * COIN]);
        let mut draft = payment(COIN);
        let placeholder = ScriptBuf::from_bytes(vec![0u8; 400]);
        draft.add_input(
            OutPoint {
                txid: fake_txid(200),
                vout: 0,
            },
            COIN,
            placeholder.clone(),
        );

        let funded = TransactionFunder::default().fund(&wallet, draft).unwrap();
        assert_eq!(funded.tx.input.len(), 2);
        assert_eq!(funded.tx.input[0].script_sig, placeholder);
        assert_eq!(funded.fee, COIN);
        assert_eq!(funded.change, Some(10 * COIN + COIN - COIN - COIN));
    }

    #[test]
    fn test_fund_all_sweeps_every_utxo() {
        let wallet = test_wallet(&[10 * COIN, COIN, COIN]);
        let funded = TransactionFunder::default()
            .fund_all(&wallet, payment(COIN))
            .unwrap();
        assert_eq!(funded.tx.input.len(), 3);
        assert_eq!(funded.change, Some(12 * COIN - COIN - COIN));
    }

    #[test]
    fn test_signed_size_does_not_exceed_estimate() {
        let wallet = test_wallet(&[COIN / 4; 12]);
        let funder = TransactionFunder::new(FeeRate::from_koinu_per_kb(1_000));
        let funded = funder.fund(&wallet, payment(2 * COIN)).unwrap();
        assert!(funded.fee >= funder.fee_rate().fee_for_size(funded.tx.total_size()));
    }
}
