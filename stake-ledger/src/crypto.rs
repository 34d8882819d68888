//! Cryptographic operations for the admin path
//!
//! This module provides:
//! - Base58 decoding of Ed25519 public keys and detached signatures
//!   (the wallet encoding used by the chain)
//! - Ed25519 verification of detached signatures
//! - SHA-256 digests for replay bookkeeping
//! - A seed-derived key pair for signing admin messages

use crate::{Error, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 public key length
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length
pub const SIGNATURE_LENGTH: usize = 64;

/// Decode a base58 Ed25519 public key
pub fn decode_public_key(encoded: &str) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
    decode_fixed::<PUBLIC_KEY_LENGTH>(encoded, "public key")
}

/// Decode a base58 Ed25519 detached signature
pub fn decode_signature(encoded: &str) -> Result<[u8; SIGNATURE_LENGTH]> {
    decode_fixed::<SIGNATURE_LENGTH>(encoded, "signature")
}

fn decode_fixed<const N: usize>(encoded: &str, what: &str) -> Result<[u8; N]> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| Error::SignatureError(format!("Invalid base58 {}: {}", what, e)))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::SignatureError(format!(
            "Invalid {} length: expected {} bytes, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}

/// Verify a detached signature with a public key
pub fn verify_signature(
    message: &[u8],
    signature: &[u8; SIGNATURE_LENGTH],
    public_key: &[u8; PUBLIC_KEY_LENGTH],
) -> bool {
    let signature = Signature::from_bytes(signature);

    let verifying_key = match VerifyingKey::from_bytes(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };

    verifying_key.verify(message, &signature).is_ok()
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Ed25519 key pair for signing admin messages
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    /// Public key, base58
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.public_key()).into_string()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign a message, base58 signature
    pub fn sign_base58(&self, message: &[u8]) -> String {
        bs58::encode(self.sign(message)).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);

        assert_eq!(keypair1.public_key(), keypair2.public_key());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::from_seed(&rand::random::<[u8; 32]>());
        let message = b"update reward rate to 12%";

        let signature = keypair.sign(message);
        assert!(verify_signature(message, &signature, &keypair.public_key()));
        assert!(!verify_signature(b"update reward rate to 99%", &signature, &keypair.public_key()));

        let other = KeyPair::from_seed(&[9u8; 32]);
        assert!(!verify_signature(message, &signature, &other.public_key()));
    }

    #[test]
    fn test_base58_roundtrip() {
        let keypair = KeyPair::from_seed(&[1u8; 32]);
        let decoded = decode_public_key(&keypair.public_key_base58()).unwrap();
        assert_eq!(decoded, keypair.public_key());

        let signature = keypair.sign_base58(b"hello");
        assert_eq!(decode_signature(&signature).unwrap(), keypair.sign(b"hello"));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        // '0' is not in the base58 alphabet
        assert!(decode_public_key("0OIl").is_err());
        // Valid base58, wrong length
        assert!(decode_public_key("3mJr7AoUXx2Wqd").is_err());
        assert!(decode_signature(&bs58::encode([1u8; 32]).into_string()).is_err());
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(b"data"), hash_bytes(b"data"));
        assert_ne!(hash_bytes(b"data"), hash_bytes(b"other"));
    }

    #[test]
    fn test_known_signature_vector() {
        // RFC 8032 test vector 1
        let seed = [
            0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60,
            0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
            0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19,
            0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
        ];

        let keypair = KeyPair::from_seed(&seed);
        let signature = keypair.sign(b"");
        assert!(verify_signature(b"", &signature, &keypair.public_key()));
    }
}
