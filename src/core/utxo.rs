use crate::utils::hex_encode;
use serde::{Deserialize, Serialize};

/// A transaction output as tracked by the UTXO store. Never deleted: spending
/// only flips `spent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Utxo {
    pub source_tx_hash: Vec<u8>,
    pub output_index: u32,
    pub amount: u64,
    pub address: Vec<u8>,
    pub spent: bool,
}

impl Utxo {
    pub fn key(&self) -> String {
        utxo_key(&self.source_tx_hash, self.output_index)
    }
}

/// `<hex tx hash>_<output index>`
pub fn utxo_key(tx_hash: &[u8], index: u32) -> String {
    format!("{}_{}", hex_encode(tx_hash), index)
}
