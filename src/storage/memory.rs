//! In-memory store backings.
//!
//! `HashMap`s behind `RwLock`s. The default backing for a node started
//! without a data directory, and for tests.

use crate::core::{Block, Transaction, Utxo};
use crate::error::{LedgerError, Result};
use crate::storage::{BlockStore, TransactionStore, UtxoStore};
use std::collections::HashMap;
use std::sync::RwLock;

fn poisoned(what: &str) -> LedgerError {
    LedgerError::Database(format!("{what} lock poisoned"))
}

#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<String, Block>>,
    heights: RwLock<HashMap<i64, String>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for MemoryBlockStore {
    fn put(&self, block: &Block) -> Result<()> {
        let hash = block.hash_hex();
        self.heights
            .write()
            .map_err(|_| poisoned("block height index"))?
            .insert(block.get_height(), hash.clone());
        self.blocks
            .write()
            .map_err(|_| poisoned("block store"))?
            .insert(hash, block.clone());
        Ok(())
    }

    fn get(&self, hash_hex: &str) -> Result<Block> {
        self.blocks
            .read()
            .map_err(|_| poisoned("block store"))?
            .get(hash_hex)
            .cloned()
            .ok_or_else(|| LedgerError::BlockNotFound(hash_hex.to_string()))
    }

    fn hash_at_height(&self, height: i64) -> Result<Option<String>> {
        Ok(self
            .heights
            .read()
            .map_err(|_| poisoned("block height index"))?
            .get(&height)
            .cloned())
    }

    fn delete(&self, block: &Block) -> Result<()> {
        let hash = block.hash_hex();
        let mut heights = self
            .heights
            .write()
            .map_err(|_| poisoned("block height index"))?;
        if heights.get(&block.get_height()) == Some(&hash) {
            heights.remove(&block.get_height());
        }
        self.blocks
            .write()
            .map_err(|_| poisoned("block store"))?
            .remove(&hash);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn put(&self, tx: &Transaction) -> Result<()> {
        self.inner
            .write()
            .map_err(|_| poisoned("transaction store"))?
            .insert(tx.hash_hex(), tx.clone());
        Ok(())
    }

    fn get(&self, hash_hex: &str) -> Result<Transaction> {
        self.inner
            .read()
            .map_err(|_| poisoned("transaction store"))?
            .get(hash_hex)
            .cloned()
            .ok_or_else(|| LedgerError::TransactionNotFound(hash_hex.to_string()))
    }

    fn delete(&self, hash_hex: &str) -> Result<()> {
        self.inner
            .write()
            .map_err(|_| poisoned("transaction store"))?
            .remove(hash_hex);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryUtxoStore {
    inner: RwLock<HashMap<String, Utxo>>,
}

impl MemoryUtxoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UtxoStore for MemoryUtxoStore {
    fn put(&self, utxo: &Utxo) -> Result<()> {
        self.inner
            .write()
            .map_err(|_| poisoned("utxo store"))?
            .insert(utxo.key(), utxo.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Utxo> {
        self.inner
            .read()
            .map_err(|_| poisoned("utxo store"))?
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::UtxoNotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner
            .write()
            .map_err(|_| poisoned("utxo store"))?
            .remove(key);
        Ok(())
    }

    // Single write lock so a concurrent put cannot interleave.
    fn mark_spent(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned("utxo store"))?;
        match inner.get_mut(key) {
            Some(utxo) => {
                utxo.spent = true;
                Ok(())
            }
            None => Err(LedgerError::UtxoNotFound(key.to_string())),
        }
    }
}
