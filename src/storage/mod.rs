//! Data storage and persistence
//!
//! Block, transaction and UTXO store contracts with in-memory and sled
//! backings, plus the pool of pending transactions.

pub mod memory;
pub mod memory_pool;
pub mod sled_store;
pub mod traits;

pub use memory::{MemoryBlockStore, MemoryTransactionStore, MemoryUtxoStore};
pub use memory_pool::Mempool;
pub use sled_store::{open_db, SledBlockStore, SledTransactionStore, SledUtxoStore};
pub use traits::{BlockStore, TransactionStore, UtxoStore};
