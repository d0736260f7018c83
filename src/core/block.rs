use crate::core::canonical::{write_bytes, write_i32, write_i64};
use crate::core::merkle::calculate_root_hash;
use crate::core::{CanonicalEncode, Transaction};
use crate::crypto::{verify_signature, PrivateKey};
use crate::error::Result;
use crate::utils::{current_timestamp, deserialize, hex_encode, serialize, sha256_digest, HASH_LEN};
use serde::{Deserialize, Serialize};

pub const BLOCK_VERSION: i32 = 1;

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Header {
    pub version: i32,
    pub height: i64,
    pub timestamp: i64,
    pub previous_hash: Vec<u8>,
    pub root_hash: Vec<u8>,
}

impl CanonicalEncode for Header {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        write_i32(out, self.version);
        write_i64(out, self.height);
        write_i64(out, self.timestamp);
        write_bytes(out, &self.previous_hash);
        write_bytes(out, &self.root_hash);
    }
}

/// A header, its transactions, and the producing validator's signature over
/// the header digest.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Block {
    /// Unsigned block on top of `previous_hash`. The root hash is derived
    /// from `transactions`.
    pub fn new_block(
        height: i64,
        previous_hash: &[u8],
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        Ok(Self::with_timestamp(
            height,
            current_timestamp()?,
            previous_hash,
            transactions,
        ))
    }

    pub fn with_timestamp(
        height: i64,
        timestamp: i64,
        previous_hash: &[u8],
        transactions: Vec<Transaction>,
    ) -> Block {
        let header = Header {
            version: BLOCK_VERSION,
            height,
            timestamp,
            previous_hash: previous_hash.to_vec(),
            root_hash: calculate_root_hash(&transactions).to_vec(),
        };
        Block {
            header,
            transactions,
            public_key: vec![],
            signature: vec![],
        }
    }

    pub fn hash(&self) -> [u8; HASH_LEN] {
        hash_block(self)
    }

    pub fn hash_hex(&self) -> String {
        hex_encode(&self.hash())
    }

    pub fn get_height(&self) -> i64 {
        self.header.height
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize(bytes)
    }
}

pub fn hash_header(header: &Header) -> [u8; HASH_LEN] {
    sha256_digest(&header.canonical_bytes())
}

/// Block identity is the header digest. Transactions are bound through
/// `root_hash`.
pub fn hash_block(block: &Block) -> [u8; HASH_LEN] {
    hash_header(&block.header)
}

/// Signs the current header and records the signer. Re-signing after a
/// header change replaces both fields.
pub fn sign_block(key: &PrivateKey, block: &mut Block) {
    let signature = key.sign(&hash_block(block));
    block.public_key = key.public().bytes();
    block.signature = signature.bytes().to_vec();
}

pub fn verify_block(block: &Block) -> bool {
    verify_signature(&block.public_key, &block.signature, &hash_block(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TxOutput;

    fn sample() -> Block {
        let to = PrivateKey::generate().public().address();
        let tx = Transaction::new(vec![], vec![TxOutput::new(10, &to)]);
        Block::with_timestamp(1, 1_700_000_000_000, &[0u8; 32], vec![tx])
    }

    #[test]
    fn test_sign_and_verify_block() {
        let key = PrivateKey::generate();
        let mut block = sample();
        assert!(!verify_block(&block));
        sign_block(&key, &mut block);
        assert!(verify_block(&block));
        assert_eq!(block.public_key, key.public().bytes());
        assert_eq!(block.signature.len(), 64);
    }

    #[test]
    fn test_header_change_invalidates_signature() {
        let key = PrivateKey::generate();
        let mut block = sample();
        sign_block(&key, &mut block);
        block.header.timestamp += 1;
        assert!(!verify_block(&block));
        sign_block(&key, &mut block);
        assert!(verify_block(&block));
    }

    #[test]
    fn test_hash_block_is_header_hash() {
        let block = sample();
        assert_eq!(hash_block(&block), hash_header(&block.header));
        let mut other = block.clone();
        other.header.previous_hash = vec![1u8; 32];
        assert_ne!(hash_block(&block), hash_block(&other));
    }

    #[test]
    fn test_root_hash_follows_transactions() {
        let block = sample();
        assert_eq!(
            block.header.root_hash,
            calculate_root_hash(&block.transactions).to_vec()
        );
    }

    #[test]
    fn test_storage_codec_round_trip() {
        let key = PrivateKey::generate();
        let mut block = sample();
        sign_block(&key, &mut block);
        let decoded = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert!(verify_block(&decoded));
    }
}
