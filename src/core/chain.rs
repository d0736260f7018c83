use crate::core::merkle::calculate_root_hash;
use crate::core::{
    genesis_block, hash_header, verify_block, verify_transaction, Block, Header,
    Transaction, Utxo,
};
use crate::crypto::hash_pub_key;
use crate::error::{LedgerError, Result};
use crate::storage::{
    open_db, BlockStore, MemoryBlockStore, MemoryTransactionStore, MemoryUtxoStore,
    SledBlockStore, SledTransactionStore, SledUtxoStore, TransactionStore, UtxoStore,
};
use crate::utils::hex_encode;
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Outputs created and consumed, and transactions seen, by earlier
/// transactions of the block being checked.
#[derive(Default)]
struct Overlay {
    hashes: HashSet<String>,
    created: HashMap<String, Utxo>,
    consumed: HashSet<String>,
}

impl Overlay {
    fn apply(&mut self, tx: &Transaction, consumed: Vec<String>) {
        let hash = tx.hash();
        self.consumed.extend(consumed);
        self.hashes.insert(hex_encode(&hash));
        for (index, output) in tx.outputs.iter().enumerate() {
            let utxo = Utxo {
                source_tx_hash: hash.to_vec(),
                output_index: index as u32,
                amount: output.amount,
                address: output.address.clone(),
                spent: false,
            };
            self.created.insert(utxo.key(), utxo);
        }
    }
}

/// Store writes made so far by a commit: transaction hashes put, and for
/// every touched output the value it had before (`None` if it was absent).
#[derive(Default)]
struct Journal {
    transactions: Vec<String>,
    utxos: Vec<(String, Option<Utxo>)>,
    block: bool,
}

/// Header list plus the three stores. `add_block` is the only writer and
/// runs validate and commit under one lock.
pub struct Chain {
    writer: Mutex<()>,
    headers: RwLock<Vec<Header>>,
    block_store: Box<dyn BlockStore>,
    tx_store: Box<dyn TransactionStore>,
    utxo_store: Box<dyn UtxoStore>,
}

impl Chain {
    /// Commits the genesis block into empty stores, or restores the header
    /// list if the stores already hold a chain.
    pub fn new(
        block_store: impl BlockStore + 'static,
        tx_store: impl TransactionStore + 'static,
        utxo_store: impl UtxoStore + 'static,
    ) -> Result<Chain> {
        let chain = Chain {
            writer: Mutex::new(()),
            headers: RwLock::new(Vec::new()),
            block_store: Box::new(block_store),
            tx_store: Box::new(tx_store),
            utxo_store: Box::new(utxo_store),
        };

        let genesis = genesis_block();
        match chain.block_store.hash_at_height(0)? {
            Some(stored) => {
                if stored != genesis.hash_hex() {
                    return Err(LedgerError::Database(format!(
                        "Store holds a different genesis block: {stored}"
                    )));
                }
                chain.restore_headers()?;
                info!("Restored chain at height {}", chain.height());
            }
            None => {
                chain.commit(&genesis)?;
                info!("Created genesis block: {}", genesis.hash_hex());
            }
        }
        Ok(chain)
    }

    pub fn in_memory() -> Result<Chain> {
        Chain::new(
            MemoryBlockStore::new(),
            MemoryTransactionStore::new(),
            MemoryUtxoStore::new(),
        )
    }

    /// Chain on a sled database at `path`, created if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Chain> {
        let db = open_db(path)?;
        Chain::new(
            SledBlockStore::new(&db)?,
            SledTransactionStore::new(&db)?,
            SledUtxoStore::new(&db)?,
        )
    }

    fn restore_headers(&self) -> Result<()> {
        let mut headers = self.write_headers();
        let mut height = 0i64;
        while let Some(hash) = self.block_store.hash_at_height(height)? {
            headers.push(self.block_store.get(&hash)?.header);
            height += 1;
        }
        Ok(())
    }

    fn read_headers(&self) -> RwLockReadGuard<'_, Vec<Header>> {
        self.headers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_headers(&self) -> RwLockWriteGuard<'_, Vec<Header>> {
        self.headers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Index of the tip header. Genesis is 0.
    pub fn height(&self) -> usize {
        self.read_headers().len().saturating_sub(1)
    }

    pub fn tip(&self) -> Header {
        self.read_headers().last().cloned().unwrap_or_default()
    }

    pub fn tip_hash(&self) -> [u8; 32] {
        hash_header(&self.tip())
    }

    pub fn headers(&self) -> Vec<Header> {
        self.read_headers().clone()
    }

    /// Validates then commits. On any error the stores are left as they were.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        let _writer = self.lock_writer();
        self.validate(block)?;
        self.commit(block)?;
        info!(
            "Added block {} at height {} with {} transaction(s)",
            block.hash_hex(),
            block.header.height,
            block.transactions.len()
        );
        Ok(())
    }

    fn validate(&self, block: &Block) -> Result<()> {
        if !verify_block(block) {
            return Err(LedgerError::InvalidBlockSignature);
        }

        let root = calculate_root_hash(&block.transactions);
        if block.header.root_hash != root {
            return Err(LedgerError::RootHashMismatch {
                expected: hex_encode(&root),
                actual: hex_encode(&block.header.root_hash),
            });
        }

        let tip = self.tip();
        let tip_hash = hash_header(&tip);
        if block.header.previous_hash != tip_hash {
            return Err(LedgerError::PreviousHashMismatch {
                expected: hex_encode(&tip_hash),
                actual: hex_encode(&block.header.previous_hash),
            });
        }

        let expected_height = tip.height + 1;
        if block.header.height != expected_height {
            return Err(LedgerError::HeightMismatch {
                expected: expected_height,
                actual: block.header.height,
            });
        }

        let mut overlay = Overlay::default();
        for tx in &block.transactions {
            self.check_transaction(tx, &overlay)
                .map(|consumed| overlay.apply(tx, consumed))?;
        }
        Ok(())
    }

    /// Splits `transactions` into those that can be sealed, in order, on top
    /// of the current tip and those that cannot. Each rejected transaction
    /// comes back with the error `add_block` would have reported for it.
    pub fn select_applicable(
        &self,
        transactions: Vec<Transaction>,
    ) -> (Vec<Transaction>, Vec<(Transaction, LedgerError)>) {
        let mut overlay = Overlay::default();
        let mut accepted = Vec::with_capacity(transactions.len());
        let mut rejected = Vec::new();
        for tx in transactions {
            match self
                .check_transaction(&tx, &overlay)
                .map(|consumed| overlay.apply(&tx, consumed))
            {
                Ok(()) => accepted.push(tx),
                Err(e) => rejected.push((tx, e)),
            }
        }
        (accepted, rejected)
    }

    /// Checks one transaction against the stores plus the outputs created and
    /// consumed earlier in the same block. Returns the keys it consumes.
    fn check_transaction(&self, tx: &Transaction, overlay: &Overlay) -> Result<Vec<String>> {
        if !verify_transaction(tx) {
            return Err(LedgerError::InvalidTransactionSignature);
        }

        let mut consumed: Vec<String> = Vec::with_capacity(tx.inputs.len());
        let mut inputs_total = 0u64;
        for input in &tx.inputs {
            let key = input.utxo_key();
            if overlay.consumed.contains(&key) || consumed.contains(&key) {
                return Err(LedgerError::UtxoSpent(key));
            }
            let utxo = match overlay.created.get(&key) {
                Some(utxo) => utxo.clone(),
                None => self.utxo_store.get(&key)?,
            };
            if utxo.spent {
                return Err(LedgerError::UtxoSpent(key));
            }
            if hash_pub_key(&input.public_key).as_slice() != utxo.address.as_slice() {
                return Err(LedgerError::UnauthorizedSpend(key));
            }
            inputs_total = inputs_total
                .checked_add(utxo.amount)
                .ok_or(LedgerError::AmountOverflow)?;
            consumed.push(key);
        }

        let outputs_total = tx.output_total()?;
        if inputs_total < outputs_total {
            return Err(LedgerError::InsufficientBalance {
                inputs: inputs_total,
                outputs: outputs_total,
            });
        }

        // Only reachable for transactions without inputs: any other repeat
        // already failed on a spent output above.
        let hash = tx.hash_hex();
        if overlay.hashes.contains(&hash) || self.tx_store.get(&hash).is_ok() {
            return Err(LedgerError::DuplicateTransaction(hash));
        }
        Ok(consumed)
    }

    // Readers of the header list wait until every store write is done.
    fn commit(&self, block: &Block) -> Result<()> {
        let mut headers = self.write_headers();
        let mut journal = Journal::default();
        if let Err(e) = self.write_stores(block, &mut journal) {
            error!("Commit of block {} failed: {e}", block.hash_hex());
            self.roll_back(block, journal);
            return Err(e);
        }
        headers.push(block.header.clone());
        Ok(())
    }

    fn write_stores(&self, block: &Block, journal: &mut Journal) -> Result<()> {
        for tx in &block.transactions {
            let hash = tx.hash();
            let hash_hex = hex_encode(&hash);
            journal.transactions.push(hash_hex.clone());
            self.tx_store.put(tx)?;

            for input in &tx.inputs {
                let key = input.utxo_key();
                let prior = self.utxo_store.get(&key)?;
                journal.utxos.push((key.clone(), Some(prior)));
                self.utxo_store.mark_spent(&key)?;
            }
            for (index, output) in tx.outputs.iter().enumerate() {
                let utxo = Utxo {
                    source_tx_hash: hash.to_vec(),
                    output_index: index as u32,
                    amount: output.amount,
                    address: output.address.clone(),
                    spent: false,
                };
                journal.utxos.push((utxo.key(), self.utxo_store.get(&utxo.key()).ok()));
                self.utxo_store.put(&utxo)?;
            }
            debug!("Committed transaction {hash_hex}");
        }
        journal.block = true;
        self.block_store.put(block)
    }

    /// Undoes a partial commit, newest write first. Every step is attempted
    /// even if an earlier one fails.
    fn roll_back(&self, block: &Block, journal: Journal) {
        if journal.block {
            if let Err(e) = self.block_store.delete(block) {
                error!("Rollback: failed to remove block: {e}");
            }
        }
        for (key, prior) in journal.utxos.into_iter().rev() {
            let undone = match prior {
                Some(utxo) => self.utxo_store.put(&utxo),
                None => self.utxo_store.delete(&key),
            };
            if let Err(e) = undone {
                error!("Rollback: failed to restore output {key}: {e}");
            }
        }
        for hash in journal.transactions.into_iter().rev() {
            if let Err(e) = self.tx_store.delete(&hash) {
                error!("Rollback: failed to remove transaction {hash}: {e}");
            }
        }
    }

    pub fn get_block_by_hash(&self, hash_hex: &str) -> Result<Block> {
        self.block_store.get(hash_hex)
    }

    pub fn get_block_by_height(&self, height: usize) -> Result<Block> {
        let hash = {
            let headers = self.read_headers();
            let tip = headers.len().saturating_sub(1);
            match headers.get(height) {
                Some(header) => hash_header(header),
                None => {
                    return Err(LedgerError::HeightOutOfRange {
                        requested: height,
                        height: tip,
                    })
                }
            }
        };
        self.block_store.get(&hex_encode(&hash))
    }

    pub fn get_transaction(&self, hash_hex: &str) -> Result<Transaction> {
        self.tx_store.get(hash_hex)
    }

    pub fn get_utxo(&self, tx_hash_hex: &str, index: u32) -> Result<Utxo> {
        self.utxo_store.get(&format!("{tx_hash_hex}_{index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        genesis_transaction, hash_block, sign_block, TxInput, TxOutput, GENESIS_KEY,
        GENESIS_SUPPLY,
    };
    use crate::crypto::PrivateKey;

    fn next_block(chain: &Chain, transactions: Vec<Transaction>) -> Block {
        let mut block = Block::with_timestamp(
            chain.height() as i64 + 1,
            1_700_000_000_000 + chain.height() as i64,
            &chain.tip_hash(),
            transactions,
        );
        sign_block(&PrivateKey::generate(), &mut block);
        block
    }

    fn spend_genesis(to: &PrivateKey, amount: u64) -> Transaction {
        let genesis = genesis_transaction();
        let mut tx = Transaction::new(
            vec![TxInput::new(&genesis.hash(), 0, GENESIS_KEY.public().bytes())],
            vec![
                TxOutput::new(amount, &to.public().address()),
                TxOutput::new(GENESIS_SUPPLY - amount, &GENESIS_KEY.public().address()),
            ],
        );
        tx.sign_inputs(&GENESIS_KEY);
        tx
    }

    #[test]
    fn test_new_chain_has_genesis() {
        let chain = Chain::in_memory().unwrap();
        assert_eq!(chain.height(), 0);
        let genesis = chain.get_block_by_height(0).unwrap();
        assert_eq!(hash_block(&genesis), hash_block(&genesis_block()));
        let utxo = chain
            .get_utxo(&genesis_transaction().hash_hex(), 0)
            .unwrap();
        assert_eq!(utxo.amount, GENESIS_SUPPLY);
        assert!(!utxo.spent);
    }

    #[test]
    fn test_empty_block_extends_chain() {
        let chain = Chain::in_memory().unwrap();
        for _ in 0..3 {
            let block = next_block(&chain, vec![]);
            chain.add_block(&block).unwrap();
        }
        assert_eq!(chain.height(), 3);
        assert_eq!(chain.headers().len(), 4);
    }

    #[test]
    fn test_unsigned_block_rejected() {
        let chain = Chain::in_memory().unwrap();
        let mut block = next_block(&chain, vec![]);
        block.signature = vec![0u8; 64];
        assert_eq!(
            chain.add_block(&block),
            Err(LedgerError::InvalidBlockSignature)
        );
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_wrong_previous_hash_rejected() {
        let chain = Chain::in_memory().unwrap();
        let mut block = Block::with_timestamp(1, 1, &[1u8; 32], vec![]);
        sign_block(&PrivateKey::generate(), &mut block);
        assert!(matches!(
            chain.add_block(&block),
            Err(LedgerError::PreviousHashMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_height_rejected() {
        let chain = Chain::in_memory().unwrap();
        let mut block = Block::with_timestamp(5, 1, &chain.tip_hash(), vec![]);
        sign_block(&PrivateKey::generate(), &mut block);
        assert_eq!(
            chain.add_block(&block),
            Err(LedgerError::HeightMismatch {
                expected: 1,
                actual: 5
            })
        );
    }

    #[test]
    fn test_root_hash_binding() {
        let chain = Chain::in_memory().unwrap();
        let bob = PrivateKey::generate();
        let mut block = next_block(&chain, vec![spend_genesis(&bob, 10)]);
        // Swap the transaction set after signing: header digest still verifies.
        block.transactions.clear();
        assert!(matches!(
            chain.add_block(&block),
            Err(LedgerError::RootHashMismatch { .. })
        ));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_spend_marks_input_spent() {
        let chain = Chain::in_memory().unwrap();
        let bob = PrivateKey::generate();
        let tx = spend_genesis(&bob, 100);
        chain.add_block(&next_block(&chain, vec![tx.clone()])).unwrap();

        let genesis_hash = genesis_transaction().hash_hex();
        assert!(chain.get_utxo(&genesis_hash, 0).unwrap().spent);
        assert_eq!(chain.get_utxo(&tx.hash_hex(), 0).unwrap().amount, 100);
        assert_eq!(chain.get_utxo(&tx.hash_hex(), 1).unwrap().amount, 900);
        assert_eq!(chain.get_transaction(&tx.hash_hex()).unwrap(), tx);
    }

    #[test]
    fn test_unauthorized_spend_rejected() {
        let chain = Chain::in_memory().unwrap();
        let mallory = PrivateKey::generate();
        let genesis = genesis_transaction();
        let mut tx = Transaction::new(
            vec![TxInput::new(&genesis.hash(), 0, mallory.public().bytes())],
            vec![TxOutput::new(1000, &mallory.public().address())],
        );
        tx.sign_inputs(&mallory);
        let block = next_block(&chain, vec![tx]);
        assert!(matches!(
            chain.add_block(&block),
            Err(LedgerError::UnauthorizedSpend(_))
        ));
    }

    #[test]
    fn test_overspend_rejected() {
        let chain = Chain::in_memory().unwrap();
        let genesis = genesis_transaction();
        let mut tx = Transaction::new(
            vec![TxInput::new(&genesis.hash(), 0, GENESIS_KEY.public().bytes())],
            vec![TxOutput::new(1001, &GENESIS_KEY.public().address())],
        );
        tx.sign_inputs(&GENESIS_KEY);
        assert_eq!(
            chain.add_block(&next_block(&chain, vec![tx])),
            Err(LedgerError::InsufficientBalance {
                inputs: 1000,
                outputs: 1001
            })
        );
    }

    #[test]
    fn test_missing_input_rejected() {
        let chain = Chain::in_memory().unwrap();
        let mut tx = Transaction::new(
            vec![TxInput::new(&[8u8; 32], 0, GENESIS_KEY.public().bytes())],
            vec![],
        );
        tx.sign_inputs(&GENESIS_KEY);
        assert!(matches!(
            chain.add_block(&next_block(&chain, vec![tx])),
            Err(LedgerError::UtxoNotFound(_))
        ));
    }

    #[test]
    fn test_intra_block_double_spend_rejected() {
        let chain = Chain::in_memory().unwrap();
        let first = spend_genesis(&PrivateKey::generate(), 10);
        let second = spend_genesis(&PrivateKey::generate(), 20);
        let block = next_block(&chain, vec![first, second]);
        assert!(matches!(
            chain.add_block(&block),
            Err(LedgerError::UtxoSpent(_))
        ));
        let genesis_hash = genesis_transaction().hash_hex();
        assert!(!chain.get_utxo(&genesis_hash, 0).unwrap().spent);
    }

    #[test]
    fn test_chained_spend_within_block() {
        let chain = Chain::in_memory().unwrap();
        let bob = PrivateKey::generate();
        let first = spend_genesis(&bob, 100);
        let mut second = Transaction::new(
            vec![TxInput::new(&first.hash(), 0, bob.public().bytes())],
            vec![TxOutput::new(100, &PrivateKey::generate().public().address())],
        );
        second.sign_inputs(&bob);
        chain
            .add_block(&next_block(&chain, vec![first.clone(), second.clone()]))
            .unwrap();
        assert!(chain.get_utxo(&first.hash_hex(), 0).unwrap().spent);
        assert!(!chain.get_utxo(&second.hash_hex(), 0).unwrap().spent);
    }

    #[test]
    fn test_height_out_of_range() {
        let chain = Chain::in_memory().unwrap();
        assert_eq!(
            chain.get_block_by_height(1),
            Err(LedgerError::HeightOutOfRange {
                requested: 1,
                height: 0
            })
        );
    }

    /// Fails every put of an output carrying `fail_amount`.
    struct FailingUtxos {
        inner: MemoryUtxoStore,
        fail_amount: u64,
    }

    impl UtxoStore for FailingUtxos {
        fn put(&self, utxo: &Utxo) -> Result<()> {
            if utxo.amount == self.fail_amount {
                return Err(LedgerError::Database("disk full".to_string()));
            }
            self.inner.put(utxo)
        }

        fn get(&self, key: &str) -> Result<Utxo> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }
    }

    /// Fails every put above genesis.
    struct FailingBlocks(MemoryBlockStore);

    impl BlockStore for FailingBlocks {
        fn put(&self, block: &Block) -> Result<()> {
            if block.get_height() > 0 {
                return Err(LedgerError::Database("disk full".to_string()));
            }
            self.0.put(block)
        }

        fn get(&self, hash_hex: &str) -> Result<Block> {
            self.0.get(hash_hex)
        }

        fn hash_at_height(&self, height: i64) -> Result<Option<String>> {
            self.0.hash_at_height(height)
        }

        fn delete(&self, block: &Block) -> Result<()> {
            self.0.delete(block)
        }
    }

    #[test]
    fn test_failed_output_write_rolls_back() {
        let chain = Chain::new(
            MemoryBlockStore::new(),
            MemoryTransactionStore::new(),
            FailingUtxos {
                inner: MemoryUtxoStore::new(),
                fail_amount: 77,
            },
        )
        .unwrap();
        let tx = spend_genesis(&PrivateKey::generate(), 77);

        assert_eq!(
            chain.add_block(&next_block(&chain, vec![tx.clone()])),
            Err(LedgerError::Database("disk full".to_string()))
        );
        assert_eq!(chain.height(), 0);
        let genesis_hash = genesis_transaction().hash_hex();
        assert!(!chain.get_utxo(&genesis_hash, 0).unwrap().spent);
        assert!(chain.get_transaction(&tx.hash_hex()).is_err());

        // The rolled-back output is still spendable.
        chain
            .add_block(&next_block(&chain, vec![spend_genesis(&PrivateKey::generate(), 50)]))
            .unwrap();
        assert_eq!(chain.height(), 1);
        assert!(chain.get_utxo(&genesis_hash, 0).unwrap().spent);
    }

    #[test]
    fn test_failed_block_write_rolls_back_outputs() {
        let chain = Chain::new(
            FailingBlocks(MemoryBlockStore::new()),
            MemoryTransactionStore::new(),
            MemoryUtxoStore::new(),
        )
        .unwrap();
        let tx = spend_genesis(&PrivateKey::generate(), 10);

        assert!(chain.add_block(&next_block(&chain, vec![tx.clone()])).is_err());
        assert_eq!(chain.height(), 0);
        assert!(!chain.get_utxo(&genesis_transaction().hash_hex(), 0).unwrap().spent);
        assert!(chain.get_utxo(&tx.hash_hex(), 0).is_err());
        assert!(chain.get_utxo(&tx.hash_hex(), 1).is_err());
        assert!(chain.get_transaction(&tx.hash_hex()).is_err());
    }

    fn zero_value_tx() -> Transaction {
        let to = PrivateKey::generate().public().address();
        Transaction::new(vec![], vec![TxOutput::new(0, &to)])
    }

    #[test]
    fn test_repeated_transaction_in_block_rejected() {
        let chain = Chain::in_memory().unwrap();
        let tx = zero_value_tx();
        // [a, a] and [a] would otherwise differ only by the duplicated leaf.
        let block = next_block(&chain, vec![tx.clone(), tx.clone()]);
        assert_eq!(
            chain.add_block(&block),
            Err(LedgerError::DuplicateTransaction(tx.hash_hex()))
        );
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_confirmed_transaction_cannot_be_sealed_again() {
        let chain = Chain::in_memory().unwrap();
        let tx = zero_value_tx();
        chain.add_block(&next_block(&chain, vec![tx.clone()])).unwrap();
        assert_eq!(
            chain.add_block(&next_block(&chain, vec![tx.clone()])),
            Err(LedgerError::DuplicateTransaction(tx.hash_hex()))
        );
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_select_applicable_drops_only_bad_transactions() {
        let chain = Chain::in_memory().unwrap();
        let alice = PrivateKey::generate();
        let good = spend_genesis(&alice, 40);
        let conflicting = spend_genesis(&PrivateKey::generate(), 60);
        let mut missing = Transaction::new(
            vec![TxInput::new(&[5u8; 32], 0, alice.public().bytes())],
            vec![TxOutput::new(1, &alice.public().address())],
        );
        missing.sign_inputs(&alice);

        let (accepted, rejected) =
            chain.select_applicable(vec![good.clone(), missing, conflicting]);

        assert_eq!(accepted, vec![good]);
        assert_eq!(rejected.len(), 2);
        assert!(matches!(rejected[0].1, LedgerError::UtxoNotFound(_)));
        assert!(matches!(rejected[1].1, LedgerError::UtxoSpent(_)));
        chain.add_block(&next_block(&chain, accepted)).unwrap();
    }
}
