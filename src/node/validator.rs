//! Block production.
//!
//! Every tick a validator drains the mempool, drops the transactions that
//! cannot apply on top of the current tip, seals the rest into a block, signs
//! it and appends it. A block the chain still rejects is dropped together
//! with its transactions.

use crate::core::{sign_block, Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::node::Node;
use crate::utils::hex_encode;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

impl Node {
    /// One production tick. `Ok(None)` when the node is not a validator or
    /// there was nothing to seal.
    pub fn produce_block(&self) -> Result<Option<Block>> {
        let Some(key) = &self.validator_key else {
            return Ok(None);
        };
        let drained = self.mempool.clear();
        if drained.is_empty() {
            debug!("Mempool empty, skipping block");
            return Ok(None);
        }

        let (transactions, rejected) = self
            .chain
            .select_applicable(order_by_dependency(drained));
        for (tx, e) in &rejected {
            warn!("Dropping transaction {}: {e}", tx.hash_hex());
        }
        if transactions.is_empty() {
            debug!("No applicable transactions, skipping block");
            return Ok(None);
        }

        let count = transactions.len();
        let mut block = Block::new_block(
            self.chain.height() as i64 + 1,
            &self.chain.tip_hash(),
            transactions,
        )?;
        sign_block(key, &mut block);

        match self.chain.add_block(&block) {
            Ok(()) => {
                info!(
                    "Produced block {} at height {} with {count} transaction(s)",
                    block.hash_hex(),
                    block.header.height
                );
                Ok(Some(block))
            }
            Err(e) => {
                warn!("Block rejected, discarding {count} transaction(s): {e}");
                Err(e)
            }
        }
    }

    /// Starts the production loop on its own thread.
    pub fn start_validator(self: &Arc<Self>) -> Result<ValidatorHandle> {
        if !self.is_validator() {
            return Err(LedgerError::Config(
                "node has no validator key".to_string(),
            ));
        }
        let (shutdown, ticks) = mpsc::channel::<()>();
        let node = Arc::clone(self);
        let interval = self.block_time;
        let thread = thread::Builder::new()
            .name("validator".to_string())
            .spawn(move || {
                info!("Validator loop started, block time {interval:?}");
                loop {
                    match ticks.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(e) = node.produce_block() {
                                error!("Block production failed: {e}");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("Validator loop stopped");
            })?;
        Ok(ValidatorHandle {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }
}

/// Stops the production loop when stopped or dropped.
pub struct ValidatorHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ValidatorHandle {
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Validator thread panicked");
            }
        }
    }
}

impl Drop for ValidatorHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Places every transaction after the ones in the same batch whose outputs
/// it spends. Anything left in a cycle keeps its original order at the end.
fn order_by_dependency(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let hashes: HashSet<String> = transactions.iter().map(Transaction::hash_hex).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(transactions.len());
    let mut remaining = transactions;

    loop {
        let before = remaining.len();
        let (ready, waiting): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|tx| {
            tx.inputs.iter().all(|input| {
                let parent = hex_encode(&input.prev_tx_hash);
                !hashes.contains(&parent) || placed.contains(&parent)
            })
        });
        for tx in ready {
            placed.insert(tx.hash_hex());
            ordered.push(tx);
        }
        remaining = waiting;
        if remaining.is_empty() || remaining.len() == before {
            break;
        }
    }
    ordered.extend(remaining);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::{genesis_transaction, Chain, TxInput, TxOutput, GENESIS_KEY, GENESIS_SEED};
    use crate::crypto::PrivateKey;
    use crate::network::LocalNetwork;
    use std::time::{Duration, Instant};

    fn validator(addr: &str) -> Arc<Node> {
        let config = Config {
            is_validator: true,
            private_key_seed: Some(PrivateKey::generate().seed_string()),
            block_time_secs: 1,
            ..Config::new(addr)
        };
        let network = LocalNetwork::new();
        let node = Node::new(&config, Chain::in_memory().unwrap(), network.clone()).unwrap();
        network.register(&node);
        node
    }

    fn pay(from: &PrivateKey, parent: &Transaction, index: u32, amount: u64) -> Transaction {
        let mut tx = Transaction::new(
            vec![TxInput::new(&parent.hash(), index, from.public().bytes())],
            vec![TxOutput::new(amount, &from.public().address())],
        );
        tx.sign_inputs(from);
        tx
    }

    #[test]
    fn test_non_validator_produces_nothing() {
        let network = LocalNetwork::new();
        let node = Node::new(
            &Config::new("a:1"),
            Chain::in_memory().unwrap(),
            network.clone(),
        )
        .unwrap();
        assert_eq!(node.produce_block(), Ok(None));
        assert!(node.start_validator().is_err());
    }

    #[test]
    fn test_empty_mempool_produces_nothing() {
        let node = validator("v:1");
        assert_eq!(node.produce_block(), Ok(None));
        assert_eq!(node.chain().height(), 0);
    }

    #[test]
    fn test_produce_block_drains_mempool() {
        let node = validator("v:1");
        let tx = pay(&GENESIS_KEY, &genesis_transaction(), 0, 1000);
        node.submit_transaction(tx.clone()).unwrap();
        let block = node.produce_block().unwrap().unwrap();
        assert_eq!(block.transactions, vec![tx]);
        assert_eq!(node.chain().height(), 1);
        assert!(node.mempool().is_empty());
    }

    fn overspend() -> Transaction {
        // Valid signature, but overspends the genesis output.
        let mut tx = Transaction::new(
            vec![TxInput::new(
                &genesis_transaction().hash(),
                0,
                GENESIS_KEY.public().bytes(),
            )],
            vec![TxOutput::new(5000, &GENESIS_KEY.public().address())],
        );
        tx.sign_inputs(&GENESIS_KEY);
        tx
    }

    #[test]
    fn test_inapplicable_transactions_discarded() {
        let node = validator("v:1");
        node.submit_transaction(overspend()).unwrap();
        assert_eq!(node.produce_block(), Ok(None));
        assert_eq!(node.chain().height(), 0);
        assert!(node.mempool().is_empty());
    }

    #[test]
    fn test_bad_transaction_does_not_sink_block() {
        let node = validator("v:1");
        let good = pay(&GENESIS_KEY, &genesis_transaction(), 0, 1000);
        let stranger = PrivateKey::generate();
        let mut missing = Transaction::new(
            vec![TxInput::new(&[7u8; 32], 0, stranger.public().bytes())],
            vec![TxOutput::new(1, &stranger.public().address())],
        );
        missing.sign_inputs(&stranger);
        node.mempool().add(missing);
        node.mempool().add(good.clone());

        let block = node.produce_block().unwrap().unwrap();
        assert_eq!(block.transactions, vec![good]);
        assert_eq!(node.chain().height(), 1);
        assert!(node.mempool().is_empty());
    }

    #[test]
    fn test_confirmed_transaction_back_in_pool_is_skipped() {
        let node = validator("v:1");
        let first = pay(&GENESIS_KEY, &genesis_transaction(), 0, 1000);
        node.submit_transaction(first.clone()).unwrap();
        node.produce_block().unwrap().unwrap();

        // A relay landing between drain and commit puts it back.
        node.mempool().add(first.clone());
        let second = pay(&GENESIS_KEY, &first, 0, 1000);
        node.mempool().add(second.clone());

        let block = node.produce_block().unwrap().unwrap();
        assert_eq!(block.transactions, vec![second]);
        assert_eq!(node.chain().height(), 2);
    }

    #[test]
    fn test_dependent_transactions_ordered() {
        let key = PrivateKey::from_seed_str(GENESIS_SEED).unwrap();
        let first = pay(&key, &genesis_transaction(), 0, 1000);
        let second = pay(&key, &first, 0, 1000);
        let third = pay(&key, &second, 0, 1000);
        let ordered = order_by_dependency(vec![third.clone(), first.clone(), second.clone()]);
        assert_eq!(ordered, vec![first, second, third]);
    }

    #[test]
    fn test_validator_loop_ticks_and_stops() {
        let node = validator("v:1");
        let handle = node.start_validator().unwrap();
        node.submit_transaction(pay(&GENESIS_KEY, &genesis_transaction(), 0, 1000))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while node.chain().height() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        handle.stop();
        assert_eq!(node.chain().height(), 1);
    }
}
