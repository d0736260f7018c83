//! # Ledger Node
//!
//! A minimal peer-to-peer ledger. Nodes keep a chain of signed blocks over a
//! UTXO transaction model, pool pending transactions, gossip them to their
//! peers, and, when configured as a validator, seal the pool into a new
//! block on a fixed interval.
//!
//! ## Layout
//! - `crypto/`: secp256k1 keys, signatures and addresses
//! - `core/`: blocks, transactions, UTXOs, Merkle roots, genesis and the chain
//! - `storage/`: store contracts, in-memory and sled backings, the mempool
//! - `network/`: wire messages, the peer table, TCP and in-process transports
//! - `node/`: handshake, discovery, gossip and the block-production loop
//! - `config/`: TOML, environment and command-line settings
//! - `cli/`: the command-line surface of the binary

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;

pub use cli::{Command, InputArg, Opt, OutputArg};
pub use config::Config;
pub use core::{
    calculate_root_hash, genesis_block, hash_block, hash_transaction, sign_block,
    sign_transaction, verify_block, verify_transaction, Block, Chain, Header, Transaction,
    TxInput, TxOutput, Utxo, GENESIS_KEY, GENESIS_SUPPLY,
};
pub use crypto::{Address, PrivateKey, PublicKey, Signature};
pub use error::{LedgerError, Result};
pub use network::{
    Delivery, Dialer, LocalNetwork, PeerClient, PeerState, Server, TcpDialer, Version,
};
pub use node::{Node, ValidatorHandle};
pub use storage::{BlockStore, Mempool, TransactionStore, UtxoStore};
