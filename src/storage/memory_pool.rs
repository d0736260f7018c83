use crate::core::Transaction;
use std::collections::HashMap;
use std::sync::RwLock;

/// Pending transactions. ( K -> tx hash hex, V => Transaction )
///
/// `add` and `clear` take the write lock, so a transaction added during a
/// drain lands either in the drained batch or in the next one.
pub struct Mempool {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// True only if the transaction was not already pending.
    pub fn add(&self, tx: Transaction) -> bool {
        let hash = tx.hash_hex();
        match self.inner.write() {
            Ok(mut pool) => {
                if pool.contains_key(&hash) {
                    return false;
                }
                pool.insert(hash, tx);
                true
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on mempool");
                false
            }
        }
    }

    pub fn has(&self, tx: &Transaction) -> bool {
        self.contains(&tx.hash_hex())
    }

    pub fn contains(&self, hash_hex: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains_key(hash_hex),
            Err(_) => {
                log::error!("Failed to acquire read lock on mempool");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on mempool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the pool and returns what it held.
    pub fn clear(&self) -> Vec<Transaction> {
        match self.inner.write() {
            Ok(mut pool) => std::mem::take(&mut *pool).into_values().collect(),
            Err(_) => {
                log::error!("Failed to acquire write lock on mempool");
                vec![]
            }
        }
    }
}
