//! Key management and signatures
//!
//! secp256k1 keys (32-byte private scalar, 33-byte compressed public point),
//! 64-byte signatures, and 20-byte addresses derived from public keys.

pub mod address;
pub mod keys;

pub use address::{hash_pub_key, Address, ADDRESS_LEN};
pub use keys::{
    verify_signature, PrivateKey, PublicKey, Signature, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN,
    SIGNATURE_LEN,
};
