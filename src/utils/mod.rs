//! Utility functions and helpers
//!
//! Digest helpers, hex and timestamp functions, and the bincode codec used
//! by the durable stores.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, hex_decode, hex_encode, ripemd160_digest, sha256_digest, HASH_LEN,
};

pub use serialization::{deserialize, serialize};
