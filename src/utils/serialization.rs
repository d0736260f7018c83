// Storage codec: bincode 2.0 with the standard configuration
use crate::error::{LedgerError, Result};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxOutput, Utxo};

    #[test]
    fn test_serialize_deserialize_utxo() {
        let original = Utxo {
            source_tx_hash: vec![7u8; 32],
            output_index: 3,
            amount: 900,
            address: vec![1u8; 20],
            spent: true,
        };

        let serialized = serialize(&original).expect("Serialization should work");
        let deserialized: Utxo = deserialize(&serialized).expect("Deserialization should work");

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<TxOutput> = deserialize(&invalid_bytes);
        assert!(matches!(result, Err(LedgerError::Serialization(_))));
    }
}
