use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

/// Version byte prefixed to every address payload
const ADDRESS_VERSION: u8 = 0x00;

/// Length of the public key hash carried in an address
const KEY_HASH_LEN: usize = 20;

/// Length of the trailing address checksum
const CHECKSUM_LEN: usize = 4;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error, PartialEq)]
pub enum CryptoError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Unsupported address version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Address checksum mismatch")]
    ChecksumMismatch,
}

/// A checksummed, base58-encoded participant identifier
///
/// The ledger treats addresses as opaque strings; this type only exists to
/// derive them from key material and to check their checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Derives an address from a public key
    ///
    /// `base58(version || key_hash || checksum)` where `key_hash` is
    /// RIPEMD-160 over SHA-256 of the key and `checksum` the first 4 bytes of
    /// a double SHA-256 over `version || key_hash`.
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let key_hash = Ripemd160::digest(Sha256::digest(public_key.as_bytes()));

        let mut payload = Vec::with_capacity(1 + KEY_HASH_LEN + CHECKSUM_LEN);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&key_hash);

        let checksum = checksum(&payload);
        payload.extend_from_slice(&checksum);

        Address(bs58::encode(payload).into_string())
    }

    /// Decodes the address and verifies its version and checksum
    pub fn verify_checksum(&self) -> Result<(), CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let expected = 1 + KEY_HASH_LEN + CHECKSUM_LEN;
        if bytes.len() != expected {
            return Err(CryptoError::InvalidLength {
                expected,
                got: bytes.len(),
            });
        }

        if bytes[0] != ADDRESS_VERSION {
            return Err(CryptoError::UnsupportedVersion(bytes[0]));
        }

        let (payload, sum) = bytes.split_at(1 + KEY_HASH_LEN);
        if checksum(payload) != sum {
            return Err(CryptoError::ChecksumMismatch);
        }

        Ok(())
    }

    /// The address as a plain string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut sum = [0u8; CHECKSUM_LEN];
    sum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    sum
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.verify_checksum()?;
        Ok(address)
    }
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Wallet::from_signing_key(signing_key)
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        Ok(Wallet::from_signing_key(SigningKey::from_bytes(&bytes_array)))
    }

    /// Creates a wallet from a hex-encoded secret key
    pub fn from_secret_key_hex(secret_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_key_hex)
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        Wallet::from_secret_key(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = Address::from_public_key(&verifying_key);

        Wallet {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Hex-encoded public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Hex-encoded private key
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Wallet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new();

        assert!(!wallet.address().0.is_empty());
        assert!(wallet.address().verify_checksum().is_ok());
        assert_eq!(wallet.public_key_hex().len(), 64);
        assert_eq!(wallet.private_key_hex().len(), 64);
    }

    #[test]
    fn test_address_is_stable() {
        let wallet = Wallet::from_secret_key(&[7u8; 32]).unwrap();
        let again = Wallet::from_secret_key(&[7u8; 32]).unwrap();

        assert_eq!(wallet.address(), again.address());
        assert_eq!(
            Address::from_public_key(wallet.public_key()),
            wallet.address().clone()
        );

        let other = Wallet::from_secret_key(&[8u8; 32]).unwrap();
        assert_ne!(wallet.address(), other.address());
    }

    #[test]
    fn test_address_embeds_hash160() {
        let wallet = Wallet::from_secret_key(&[5u8; 32]).unwrap();
        let bytes = bs58::decode(wallet.address().as_str()).into_vec().unwrap();

        let expected = Ripemd160::digest(Sha256::digest(wallet.public_key().as_bytes()));
        assert_eq!(bytes.len(), 1 + KEY_HASH_LEN + CHECKSUM_LEN);
        assert_eq!(bytes[0], ADDRESS_VERSION);
        assert_eq!(&bytes[1..1 + KEY_HASH_LEN], expected.as_slice());
        assert_eq!(&bytes[1 + KEY_HASH_LEN..], &checksum(&bytes[..1 + KEY_HASH_LEN]));
    }

    #[test]
    fn test_restore_from_hex() {
        let wallet = Wallet::new();
        let restored = Wallet::from_secret_key_hex(&wallet.private_key_hex()).unwrap();

        assert_eq!(restored.address(), wallet.address());
        assert!(matches!(
            Wallet::from_secret_key_hex("zz"),
            Err(CryptoError::DecodingError(_))
        ));
        assert!(matches!(
            Wallet::from_secret_key(&[1u8; 16]),
            Err(CryptoError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let wallet = Wallet::from_secret_key(&[3u8; 32]).unwrap();
        let mut bytes = bs58::decode(wallet.address().as_str()).into_vec().unwrap();
        bytes[5] ^= 0x01;
        let corrupted = Address(bs58::encode(bytes).into_string());

        assert_eq!(corrupted.verify_checksum(), Err(CryptoError::ChecksumMismatch));
    }

    #[test]
    fn test_parse_address() {
        let wallet = Wallet::new();

        let parsed: Address = wallet.address().as_str().parse().unwrap();
        assert_eq!(&parsed, wallet.address());

        assert!(matches!(
            "myAddr".parse::<Address>(),
            Err(CryptoError::InvalidLength { .. })
        ));
        assert!(matches!(
            "0OIl".parse::<Address>(),
            Err(CryptoError::DecodingError(_))
        ));
    }
}
