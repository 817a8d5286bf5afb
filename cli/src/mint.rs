use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};
use utxo_inscribe::Error;

use crate::config::CliEngine;

#[derive(Debug, Args)]
pub struct MintArgs {
    /// MIME type of the payload, e.g. text/plain or image/png
    pub content_type: String,

    /// Destination address (defaults to the wallet address)
    #[arg(long)]
    pub to: Option<String>,

    /// Read the payload from a file
    #[arg(long, required_unless_present = "hex", conflicts_with = "hex")]
    pub file: Option<PathBuf>,

    /// Payload as hex
    #[arg(long)]
    pub hex: Option<String>,
}

impl MintArgs {
    fn payload(&self) -> Result<Vec<u8>> {
        match (&self.file, &self.hex) {
            (Some(path), _) => {
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
            }
            (None, Some(data)) => hex::decode(data).context("Invalid hex payload"),
            (None, None) => bail!("provide --file or --hex"),
        }
    }
}

pub fn handle_mint(engine: &CliEngine, args: MintArgs) -> Result<()> {
    let data = args.payload()?;
    match engine.inscribe(args.to.as_deref(), &args.content_type, &data) {
        Ok(txid) => {
            info!(%txid, bytes = data.len(), "inscription broadcast");
            println!("{}", txid);
            Ok(())
        }
        Err(Error::ChainPartiallySubmitted {
            submitted,
            total,
            pending: Some(path),
            source,
        }) => {
            warn!(
                submitted,
                total,
                pending = %path.display(),
                "inscription chain interrupted"
            );
            bail!(
                "{} of {} transactions broadcast ({}); run `resume` to submit the rest saved in {}",
                submitted,
                total,
                source,
                path.display()
            )
        }
        Err(e) => Err(e).context("Failed to inscribe"),
    }
}

pub fn handle_resume(engine: &CliEngine) -> Result<()> {
    let txids = engine
        .resume_pending()
        .context("Failed to broadcast pending transactions")?;
    if txids.is_empty() {
        println!("nothing pending");
    } else {
        info!(count = txids.len(), "pending transactions broadcast");
    }
    for txid in txids {
        println!("{}", txid);
    }
    Ok(())
}
