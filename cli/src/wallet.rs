use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::CliEngine;

const KOINU_PER_DOGE: f64 = 100_000_000.0;

#[derive(Subcommand)]
pub enum WalletCommand {
    /// Create a new wallet with a random key
    New,
    /// Import a WIF key, a 64-character hex key or a BIP39 recovery phrase
    Import {
        /// Key or phrase (quote the phrase)
        key: String,
    },
    /// Print the wallet address
    Address,
    /// Replace the local UTXO set with the indexer's view
    Sync,
    /// Print the local balance without contacting the network
    Balance,
    /// Pay an amount to an address
    Send {
        address: String,
        /// Amount in koinu
        amount: u64,
    },
    /// Split the balance into equal outputs to the wallet itself
    Split {
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,
    },
}

pub fn handle_command(engine: &CliEngine, command: WalletCommand) -> Result<()> {
    match command {
        WalletCommand::New => {
            let address = engine.create_wallet().context("Failed to create wallet")?;
            println!("{}", address);
        }
        WalletCommand::Import { key } => {
            let address = engine.import_wallet(&key).context("Failed to import wallet")?;
            println!("{}", address);
        }
        WalletCommand::Address => {
            println!("{}", engine.address().context("Failed to load wallet")?);
        }
        WalletCommand::Sync => {
            let balance = engine.sync().context("Failed to sync wallet")?;
            println!("{}", format_balance(balance));
        }
        WalletCommand::Balance => {
            let balance = engine.balance().context("Failed to load wallet")?;
            println!("{}", format_balance(balance));
        }
        WalletCommand::Send { address, amount } => {
            let txid = engine
                .send(&address, amount)
                .with_context(|| format!("Failed to send {} koinu to {}", amount, address))?;
            println!("{}", txid);
        }
        WalletCommand::Split { count } => {
            let txid = engine
                .split(count as usize)
                .with_context(|| format!("Failed to split wallet into {} outputs", count))?;
            println!("{}", txid);
        }
    }
    Ok(())
}

fn format_balance(koinu: u64) -> String {
    format!("{} koinu ({:.8} DOGE)", koinu, koinu as f64 / KOINU_PER_DOGE)
}
