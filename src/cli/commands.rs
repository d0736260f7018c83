use crate::crypto::Address;
use crate::error::{LedgerError, Result};
use crate::utils::hex_decode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Output being spent, given as `<tx hash hex>:<output index>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputArg {
    pub tx_hash: Vec<u8>,
    pub index: u32,
}

impl FromStr for InputArg {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let (hash, index) = s.rsplit_once(':').ok_or_else(|| {
            LedgerError::InvalidEncoding(format!("Invalid input {s}: expected <tx hash>:<index>"))
        })?;
        let index = index
            .parse::<u32>()
            .map_err(|e| LedgerError::InvalidEncoding(format!("Invalid output index {index}: {e}")))?;
        Ok(InputArg {
            tx_hash: hex_decode(hash)?,
            index,
        })
    }
}

/// Payment, given as `<address hex>:<amount>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArg {
    pub address: Address,
    pub amount: u64,
}

impl FromStr for OutputArg {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let (address, amount) = s.rsplit_once(':').ok_or_else(|| {
            LedgerError::InvalidEncoding(format!("Invalid output {s}: expected <address>:<amount>"))
        })?;
        let amount = amount
            .parse::<u64>()
            .map_err(|e| LedgerError::InvalidEncoding(format!("Invalid amount {amount}: {e}")))?;
        Ok(OutputArg {
            address: address.parse()?,
            amount,
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "ledger-node")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start", about = "Start a node")]
    Start {
        #[arg(long, help = "TOML configuration file")]
        config: Option<PathBuf>,
        #[arg(long, help = "Address to listen on")]
        listen: Option<String>,
        #[arg(long = "peer", help = "Bootstrap peer address (repeatable)")]
        peers: Vec<String>,
        #[arg(long, help = "Produce blocks with the key from this hex seed")]
        validator_seed: Option<String>,
        #[arg(long, help = "Directory for the on-disk chain")]
        data_dir: Option<PathBuf>,
    },
    #[command(name = "keygen", about = "Generate a new key pair")]
    Keygen,
    #[command(name = "address", about = "Print the address of a key seed")]
    Address {
        #[arg(long, help = "Hex private key seed")]
        seed: String,
    },
    #[command(name = "send", about = "Sign a transaction and submit it to a node")]
    Send {
        #[arg(long, help = "Node to submit to")]
        node: String,
        #[arg(long, help = "Hex seed of the key owning the inputs")]
        seed: String,
        #[arg(long = "input", required = true, help = "<tx hash>:<index> (repeatable)")]
        inputs: Vec<InputArg>,
        #[arg(long = "output", required = true, help = "<address>:<amount> (repeatable)")]
        outputs: Vec<OutputArg>,
    },
}
