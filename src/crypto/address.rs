use crate::error::{LedgerError, Result};
use crate::utils::{hex_decode, hex_encode, ripemd160_digest, sha256_digest};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 20;

/// Spend target derived one-way from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: &[u8]) -> Result<Address> {
        if bytes.len() != ADDRESS_LEN {
            return Err(LedgerError::InvalidEncoding(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(bytes);
        Ok(Address(out))
    }

    pub(crate) fn from_public_key_bytes(public_key: &[u8]) -> Address {
        Address(hash_pub_key(public_key))
    }

    pub fn bytes(&self) -> [u8; ADDRESS_LEN] {
        self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// RIPEMD-160 over SHA-256 of the encoded public key.
pub fn hash_pub_key(pub_key: &[u8]) -> [u8; ADDRESS_LEN] {
    ripemd160_digest(&sha256_digest(pub_key))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Address::from_bytes(&hex_decode(s)?)
    }
}
