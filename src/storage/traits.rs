//! Store contracts the chain is written against.
//!
//! Each call is atomic on its own. Consistency across stores during a block
//! commit is the chain's job, not the store's.

use crate::core::{Block, Transaction, Utxo};
use crate::error::Result;

/// Blocks keyed by the hex digest of their header.
pub trait BlockStore: Send + Sync {
    fn put(&self, block: &Block) -> Result<()>;

    /// Fails with `BlockNotFound` on a miss.
    fn get(&self, hash_hex: &str) -> Result<Block>;

    /// Hash of the stored block at `height`, if any. Used to restore the
    /// header list when reopening a durable store.
    fn hash_at_height(&self, height: i64) -> Result<Option<String>>;

    /// Removes the block and its height index entry. Missing is not an error.
    fn delete(&self, block: &Block) -> Result<()>;
}

/// Transactions keyed by the hex digest of their canonical encoding.
pub trait TransactionStore: Send + Sync {
    fn put(&self, tx: &Transaction) -> Result<()>;

    /// Fails with `TransactionNotFound` on a miss.
    fn get(&self, hash_hex: &str) -> Result<Transaction>;

    /// Missing is not an error.
    fn delete(&self, hash_hex: &str) -> Result<()>;
}

/// Outputs keyed by `<tx hash hex>_<output index>`.
pub trait UtxoStore: Send + Sync {
    fn put(&self, utxo: &Utxo) -> Result<()>;

    /// Fails with `UtxoNotFound` on a miss.
    fn get(&self, key: &str) -> Result<Utxo>;

    /// Missing is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Flips `spent` on an existing entry.
    fn mark_spent(&self, key: &str) -> Result<()> {
        let mut utxo = self.get(key)?;
        utxo.spent = true;
        self.put(&utxo)
    }
}
