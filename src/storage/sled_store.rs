//! sled-backed stores.
//!
//! One tree per store inside a single `sled::Db`, values encoded with the
//! bincode storage codec.

use crate::core::{Block, Transaction, Utxo};
use crate::error::{LedgerError, Result};
use crate::storage::{BlockStore, TransactionStore, UtxoStore};
use crate::utils::{deserialize, serialize};
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const HEIGHTS_TREE: &str = "block_heights";
const TRANSACTIONS_TREE: &str = "transactions";
const UTXO_TREE: &str = "utxos";

pub fn open_db(path: impl AsRef<Path>) -> Result<Db> {
    sled::open(path.as_ref()).map_err(|e| {
        LedgerError::Database(format!(
            "Failed to open database at {}: {e}",
            path.as_ref().display()
        ))
    })
}

fn open_tree(db: &Db, name: &str) -> Result<Tree> {
    db.open_tree(name)
        .map_err(|e| LedgerError::Database(format!("Failed to open {name} tree: {e}")))
}

pub struct SledBlockStore {
    blocks: Tree,
    heights: Tree,
}

impl SledBlockStore {
    pub fn new(db: &Db) -> Result<Self> {
        Ok(SledBlockStore {
            blocks: open_tree(db, BLOCKS_TREE)?,
            heights: open_tree(db, HEIGHTS_TREE)?,
        })
    }
}

impl BlockStore for SledBlockStore {
    fn put(&self, block: &Block) -> Result<()> {
        let hash = block.hash_hex();
        self.blocks.insert(hash.as_bytes(), block.serialize()?)?;
        self.heights
            .insert(block.get_height().to_be_bytes(), hash.as_bytes())?;
        self.blocks.flush()?;
        self.heights.flush()?;
        Ok(())
    }

    fn get(&self, hash_hex: &str) -> Result<Block> {
        match self.blocks.get(hash_hex.as_bytes())? {
            Some(bytes) => Block::deserialize(&bytes),
            None => Err(LedgerError::BlockNotFound(hash_hex.to_string())),
        }
    }

    fn hash_at_height(&self, height: i64) -> Result<Option<String>> {
        match self.heights.get(height.to_be_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| LedgerError::Database(format!("Corrupt height index: {e}"))),
            None => Ok(None),
        }
    }

    fn delete(&self, block: &Block) -> Result<()> {
        let hash = block.hash_hex();
        let height_key = block.get_height().to_be_bytes();
        if self.heights.get(height_key)?.as_deref() == Some(hash.as_bytes()) {
            self.heights.remove(height_key)?;
        }
        self.blocks.remove(hash.as_bytes())?;
        self.blocks.flush()?;
        Ok(())
    }
}

pub struct SledTransactionStore {
    tree: Tree,
}

impl SledTransactionStore {
    pub fn new(db: &Db) -> Result<Self> {
        Ok(SledTransactionStore {
            tree: open_tree(db, TRANSACTIONS_TREE)?,
        })
    }
}

impl TransactionStore for SledTransactionStore {
    fn put(&self, tx: &Transaction) -> Result<()> {
        self.tree.insert(tx.hash_hex().as_bytes(), tx.serialize()?)?;
        Ok(())
    }

    fn get(&self, hash_hex: &str) -> Result<Transaction> {
        match self.tree.get(hash_hex.as_bytes())? {
            Some(bytes) => Transaction::deserialize(&bytes),
            None => Err(LedgerError::TransactionNotFound(hash_hex.to_string())),
        }
    }

    fn delete(&self, hash_hex: &str) -> Result<()> {
        self.tree.remove(hash_hex.as_bytes())?;
        Ok(())
    }
}

pub struct SledUtxoStore {
    tree: Tree,
}

impl SledUtxoStore {
    pub fn new(db: &Db) -> Result<Self> {
        Ok(SledUtxoStore {
            tree: open_tree(db, UTXO_TREE)?,
        })
    }
}

impl UtxoStore for SledUtxoStore {
    fn put(&self, utxo: &Utxo) -> Result<()> {
        self.tree.insert(utxo.key().as_bytes(), serialize(utxo)?)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Utxo> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => deserialize(&bytes),
            None => Err(LedgerError::UtxoNotFound(key.to_string())),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }
}
