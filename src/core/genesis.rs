use crate::core::{sign_block, Block, Transaction, TxOutput};
use crate::crypto::PrivateKey;
use once_cell::sync::Lazy;

/// Seed of the key that signs the genesis block and owns the initial supply.
pub const GENESIS_SEED: &str = "5b28e30d8d93486fa1d446dfb79b1d8efd07af80a371b82e18d2bb23531e3ea4";

pub const GENESIS_SUPPLY: u64 = 1000;

pub static GENESIS_KEY: Lazy<PrivateKey> = Lazy::new(|| {
    PrivateKey::from_seed_str(GENESIS_SEED).expect("genesis seed is a valid 32-byte scalar")
});

/// The coinbase-style transaction crediting the whole supply to the genesis
/// key's address. It has no inputs.
pub fn genesis_transaction() -> Transaction {
    let address = GENESIS_KEY.public().address();
    Transaction::new(vec![], vec![TxOutput::new(GENESIS_SUPPLY, &address)])
}

/// Height 0, timestamp 0, zero previous hash. Identical on every node, so
/// every chain starts from the same tip hash.
pub fn genesis_block() -> Block {
    let mut block = Block::with_timestamp(0, 0, &[0u8; 32], vec![genesis_transaction()]);
    sign_block(&GENESIS_KEY, &mut block);
    block
}
