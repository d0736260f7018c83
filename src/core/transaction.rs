// Transactions follow the UTXO model: each input consumes one earlier output,
// each output creates a new spendable balance locked to an address.

use crate::core::canonical::{write_bytes, write_i32, write_seq, write_u32, write_u64};
use crate::core::CanonicalEncode;
use crate::crypto::{verify_signature, Address, PrivateKey, Signature};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, hex_encode, serialize, sha256_digest, HASH_LEN};
use serde::{Deserialize, Serialize};

pub const TRANSACTION_VERSION: i32 = 1;

/// References exactly one prior output.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    pub prev_tx_hash: Vec<u8>,
    pub prev_out_index: u32,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl TxInput {
    /// Unsigned input spending `prev_out_index` of `prev_tx_hash`.
    pub fn new(prev_tx_hash: &[u8], prev_out_index: u32, public_key: Vec<u8>) -> TxInput {
        TxInput {
            prev_tx_hash: prev_tx_hash.to_vec(),
            prev_out_index,
            public_key,
            signature: vec![],
        }
    }

    /// Store key of the output this input consumes.
    pub fn utxo_key(&self) -> String {
        crate::core::utxo_key(&self.prev_tx_hash, self.prev_out_index)
    }
}

impl CanonicalEncode for TxInput {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        write_bytes(out, &self.prev_tx_hash);
        write_u32(out, self.prev_out_index);
        write_bytes(out, &self.public_key);
        write_bytes(out, &self.signature);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxOutput {
    pub amount: u64,
    pub address: Vec<u8>,
}

impl TxOutput {
    pub fn new(amount: u64, address: &Address) -> TxOutput {
        TxOutput {
            amount,
            address: address.to_vec(),
        }
    }
}

impl CanonicalEncode for TxOutput {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        write_u64(out, self.amount);
        write_bytes(out, &self.address);
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl CanonicalEncode for Transaction {
    fn encode_canonical(&self, out: &mut Vec<u8>) {
        write_i32(out, self.version);
        write_seq(out, &self.inputs);
        write_seq(out, &self.outputs);
    }
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
        Transaction {
            version: TRANSACTION_VERSION,
            inputs,
            outputs,
        }
    }

    pub fn hash(&self) -> [u8; HASH_LEN] {
        hash_transaction(self)
    }

    pub fn hash_hex(&self) -> String {
        hex_encode(&self.hash())
    }

    /// Digest every input signs: this transaction with all input signatures
    /// cleared. Independent of which input is being checked.
    pub fn signing_digest(&self) -> [u8; HASH_LEN] {
        let mut preimage = self.clone();
        for input in preimage.inputs.iter_mut() {
            input.signature.clear();
        }
        hash_transaction(&preimage)
    }

    /// Signs every input whose public key belongs to `key`.
    pub fn sign_inputs(&mut self, key: &PrivateKey) {
        let public_key = key.public().bytes();
        let signature = sign_transaction(key, self);
        for input in self.inputs.iter_mut() {
            if input.public_key == public_key {
                input.signature = signature.bytes().to_vec();
            }
        }
    }

    pub fn output_total(&self) -> Result<u64> {
        self.outputs.iter().try_fold(0u64, |acc, out| {
            acc.checked_add(out.amount)
                .ok_or(LedgerError::AmountOverflow)
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

pub fn hash_transaction(tx: &Transaction) -> [u8; HASH_LEN] {
    sha256_digest(&tx.canonical_bytes())
}

/// Signature over [`Transaction::signing_digest`].
pub fn sign_transaction(key: &PrivateKey, tx: &Transaction) -> Signature {
    key.sign(&tx.signing_digest())
}

/// Checks every input signature against the shared cleared-signature digest.
/// The transaction itself is never modified.
pub fn verify_transaction(tx: &Transaction) -> bool {
    let digest = tx.signing_digest();
    tx.inputs
        .iter()
        .all(|input| verify_signature(&input.public_key, &input.signature, &digest))
}
