//! Core ledger functionality
//!
//! Blocks, transactions and UTXOs, their canonical digests and signatures,
//! the genesis block, and the chain that validates and appends blocks.

pub mod block;
pub mod canonical;
pub mod chain;
pub mod genesis;
pub mod merkle;
pub mod transaction;
pub mod utxo;

pub use block::{hash_block, hash_header, sign_block, verify_block, Block, Header, BLOCK_VERSION};
pub use canonical::CanonicalEncode;
pub use chain::Chain;
pub use genesis::{genesis_block, genesis_transaction, GENESIS_KEY, GENESIS_SEED, GENESIS_SUPPLY};
pub use merkle::{calculate_root_hash, EMPTY_ROOT};
pub use transaction::{
    hash_transaction, sign_transaction, verify_transaction, Transaction, TxInput, TxOutput,
    TRANSACTION_VERSION,
};
pub use utxo::{utxo_key, Utxo};
