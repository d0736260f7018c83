//! Error handling for the ledger node
//!
//! One error type covers validation failures, store misses, peer/network
//! failures and malformed encodings. Every variant is recoverable: callers
//! get it back as a value and the node keeps serving.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Block signature does not verify under the embedded signer key
    InvalidBlockSignature,
    /// At least one transaction input signature does not verify
    InvalidTransactionSignature,
    /// Block does not link to the current tip
    PreviousHashMismatch { expected: String, actual: String },
    /// Header root hash does not commit to the block's transactions
    RootHashMismatch { expected: String, actual: String },
    /// Header height is not tip height + 1
    HeightMismatch { expected: i64, actual: i64 },
    /// Outputs spend more than the inputs provide
    InsufficientBalance { inputs: u64, outputs: u64 },
    /// Referenced output was already consumed
    UtxoSpent(String),
    /// Referenced output does not exist
    UtxoNotFound(String),
    /// Input public key does not own the referenced output
    UnauthorizedSpend(String),
    /// Amount arithmetic overflowed
    AmountOverflow,
    /// Transaction already confirmed, or repeated within one block
    DuplicateTransaction(String),
    HeightOutOfRange { requested: usize, height: usize },
    BlockNotFound(String),
    TransactionNotFound(String),
    /// Network communication errors
    Network(String),
    HandshakeFailed { addr: String, reason: String },
    /// One entry per bootstrap address that could not be reached
    Bootstrap(Vec<(String, String)>),
    /// One entry per peer a broadcast could not reach
    Broadcast(Vec<(String, String)>),
    /// Malformed key, signature or address bytes
    InvalidEncoding(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Database-related errors
    Database(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
}

impl LedgerError {
    /// True for errors produced by block/transaction validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidBlockSignature
                | LedgerError::InvalidTransactionSignature
                | LedgerError::PreviousHashMismatch { .. }
                | LedgerError::RootHashMismatch { .. }
                | LedgerError::HeightMismatch { .. }
                | LedgerError::InsufficientBalance { .. }
                | LedgerError::UtxoSpent(_)
                | LedgerError::UtxoNotFound(_)
                | LedgerError::UnauthorizedSpend(_)
                | LedgerError::AmountOverflow
                | LedgerError::DuplicateTransaction(_)
        )
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidBlockSignature => write!(f, "Invalid block signature"),
            LedgerError::InvalidTransactionSignature => {
                write!(f, "Invalid transaction signature")
            }
            LedgerError::PreviousHashMismatch { expected, actual } => {
                write!(f, "Previous hash mismatch: expected {expected}, got {actual}")
            }
            LedgerError::RootHashMismatch { expected, actual } => {
                write!(f, "Root hash mismatch: expected {expected}, got {actual}")
            }
            LedgerError::HeightMismatch { expected, actual } => {
                write!(f, "Height mismatch: expected {expected}, got {actual}")
            }
            LedgerError::InsufficientBalance { inputs, outputs } => {
                write!(
                    f,
                    "Insufficient balance: inputs {inputs}, outputs {outputs}"
                )
            }
            LedgerError::UtxoSpent(key) => write!(f, "Output already spent: {key}"),
            LedgerError::UtxoNotFound(key) => write!(f, "Output not found: {key}"),
            LedgerError::UnauthorizedSpend(key) => {
                write!(f, "Input key does not own output {key}")
            }
            LedgerError::AmountOverflow => write!(f, "Amount overflow"),
            LedgerError::DuplicateTransaction(hash) => {
                write!(f, "Duplicate transaction: {hash}")
            }
            LedgerError::HeightOutOfRange { requested, height } => {
                write!(f, "Height {requested} out of range (chain height {height})")
            }
            LedgerError::BlockNotFound(hash) => write!(f, "Block not found: {hash}"),
            LedgerError::TransactionNotFound(hash) => {
                write!(f, "Transaction not found: {hash}")
            }
            LedgerError::Network(msg) => write!(f, "Network error: {msg}"),
            LedgerError::HandshakeFailed { addr, reason } => {
                write!(f, "Handshake with {addr} failed: {reason}")
            }
            LedgerError::Bootstrap(failures) => {
                write!(f, "Bootstrap failed for {} peer(s):", failures.len())?;
                for (addr, reason) in failures {
                    write!(f, " [{addr}: {reason}]")?;
                }
                Ok(())
            }
            LedgerError::Broadcast(failures) => {
                write!(f, "Broadcast failed for {} peer(s):", failures.len())?;
                for (addr, reason) in failures {
                    write!(f, " [{addr}: {reason}]")?;
                }
                Ok(())
            }
            LedgerError::InvalidEncoding(msg) => write!(f, "Invalid encoding: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(LedgerError::UtxoSpent("ab_0".to_string()).is_validation());
        assert!(LedgerError::InsufficientBalance {
            inputs: 1,
            outputs: 2
        }
        .is_validation());
        assert!(!LedgerError::Network("down".to_string()).is_validation());
        assert!(!LedgerError::BlockNotFound("ff".to_string()).is_validation());
    }

    #[test]
    fn test_bootstrap_display_lists_every_failure() {
        let err = LedgerError::Bootstrap(vec![
            ("127.0.0.1:4000".to_string(), "refused".to_string()),
            ("127.0.0.1:5000".to_string(), "timeout".to_string()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 peer(s)"));
        assert!(msg.contains("127.0.0.1:4000: refused"));
        assert!(msg.contains("127.0.0.1:5000: timeout"));
    }
}
