use crate::crypto::Address;
use crate::error::{LedgerError, Result};
use crate::utils::{hex_decode, hex_encode};
use k256::ecdsa::signature::{RandomizedSigner, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

pub const PRIVATE_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 33;
pub const SIGNATURE_LEN: usize = 64;

/// secp256k1 signing key.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    pub fn generate() -> PrivateKey {
        PrivateKey {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<PrivateKey> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(LedgerError::InvalidEncoding(format!(
                "private key must be {PRIVATE_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let inner = SigningKey::from_slice(bytes)
            .map_err(|_| LedgerError::InvalidEncoding("private key out of range".to_string()))?;
        Ok(PrivateKey { inner })
    }

    /// Rebuilds a key from its 64-character hex seed. The same seed always
    /// yields the same key.
    pub fn from_seed_str(seed: &str) -> Result<PrivateKey> {
        Self::from_bytes(&hex_decode(seed)?)
    }

    pub fn bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        let mut out = [0u8; PRIVATE_KEY_LEN];
        out.copy_from_slice(self.inner.to_bytes().as_slice());
        out
    }

    /// Hex seed accepted by [`PrivateKey::from_seed_str`].
    pub fn seed_string(&self) -> String {
        hex_encode(&self.bytes())
    }

    pub fn public(&self) -> PublicKey {
        PublicKey {
            inner: *self.inner.verifying_key(),
        }
    }

    /// Signs `message` with a fresh random nonce.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature: EcdsaSignature = self.inner.sign_with_rng(&mut OsRng, message);
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(signature.to_bytes().as_slice());
        Signature { bytes }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public())
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Accepts compressed (33) or uncompressed (65) SEC1 points.
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        let inner = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| {
            LedgerError::InvalidEncoding(format!(
                "invalid public key ({} bytes)",
                bytes.len()
            ))
        })?;
        Ok(PublicKey { inner })
    }

    /// Compressed SEC1 encoding.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn address(&self) -> Address {
        Address::from_public_key_bytes(&self.bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex_encode(&self.bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(&self.bytes()))
    }
}

/// Fixed 64-byte `r || s` signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LEN],
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(LedgerError::InvalidEncoding(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(bytes);
        Ok(Signature { bytes: out })
    }

    pub fn bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.bytes
    }

    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        match EcdsaSignature::from_slice(&self.bytes) {
            Ok(signature) => public_key.inner.verify(message, &signature).is_ok(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex_encode(&self.bytes))
    }
}

/// Verifies raw wire bytes. Malformed keys or signatures verify as false.
pub fn verify_signature(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_bytes(signature) else {
        return false;
    };
    signature.verify(&public_key, message)
}
