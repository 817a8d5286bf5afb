use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod mint;
mod wallet;

use config::EngineArgs;

/// Inscribe files on Dogecoin through chained P2SH transactions
#[derive(Parser)]
#[command(name = "utxo-inscribe-cli", version, about)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management
    #[command(subcommand)]
    Wallet(wallet::WalletCommand),
    /// Inscribe a payload
    Mint(mint::MintArgs),
    /// Broadcast the remainder of an interrupted inscription
    Resume,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = cli.engine.engine();

    match cli.command {
        Commands::Wallet(cmd) => wallet::handle_command(&engine, cmd),
        Commands::Mint(args) => mint::handle_mint(&engine, args),
        Commands::Resume => mint::handle_resume(&engine),
    }
}
