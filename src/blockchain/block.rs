use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;

use super::transaction::Transaction;

/// A 256-bit block digest
///
/// Serialized as a lowercase hexadecimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// The all-zero digest used as the genesis block's previous hash
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Returns the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Renders the digest as a lowercase hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns true if the first `difficulty` hex characters are all '0'
    pub fn has_leading_zeros(&self, difficulty: usize) -> bool {
        let hex = self.to_hex();
        difficulty <= hex.len() && hex.bytes().take(difficulty).all(|c| c == b'0')
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(serde::de::Error::custom)?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("block hash must be 32 bytes"))?;
        Ok(BlockHash(digest))
    }
}

/// Represents a block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Proof of work nonce
    pub nonce: u64,

    /// Hash of the previous block
    #[schema(value_type = String, example = "000a3f...")]
    pub previous_hash: BlockHash,

    /// Creation time in nanoseconds since the Unix epoch
    pub timestamp: i64,

    /// Transactions sealed in this block, in pool order
    pub transactions: Vec<Transaction>,
}

/// Borrowed view fixing the canonical field order used for hashing
#[derive(Serialize)]
struct CanonicalBlock<'a> {
    nonce: u64,
    previous_hash: &'a BlockHash,
    timestamp: i64,
    transactions: Vec<CanonicalTransaction<'a>>,
}

/// Transaction fields as hashed: the value is encoded by its bit pattern
#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    sender: &'a str,
    receiver: &'a str,
    value_bits: u64,
}

impl<'a> From<&'a Transaction> for CanonicalTransaction<'a> {
    fn from(transaction: &'a Transaction) -> Self {
        CanonicalTransaction {
            sender: &transaction.sender,
            receiver: &transaction.receiver,
            value_bits: transaction.value.to_bits(),
        }
    }
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `nonce` - The proof of work nonce
    /// * `previous_hash` - The hash of the previous block
    /// * `transactions` - The transactions to seal, moved into the block
    ///
    /// # Returns
    ///
    /// A new Block instance
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Block::with_timestamp(nonce, previous_hash, timestamp, transactions)
    }

    /// Creates a block with an explicit timestamp
    pub fn with_timestamp(
        nonce: u64,
        previous_hash: BlockHash,
        timestamp: i64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            nonce,
            previous_hash,
            timestamp,
            transactions,
        }
    }

    /// Creates the genesis block: zero nonce, zero previous hash, no transactions
    pub fn genesis() -> Self {
        Block::with_timestamp(0, BlockHash::ZERO, 0, Vec::new())
    }

    /// Returns true if this block has the shape of a genesis block
    pub fn is_genesis(&self) -> bool {
        self.previous_hash == BlockHash::ZERO && self.transactions.is_empty()
    }

    /// Produces the canonical byte encoding of the block
    pub fn serialize(&self) -> Vec<u8> {
        serialize_fields(self.nonce, &self.previous_hash, self.timestamp, &self.transactions)
    }

    /// Calculates the SHA-256 hash of the block's canonical encoding
    pub fn hash(&self) -> BlockHash {
        compute_hash(self.nonce, &self.previous_hash, self.timestamp, &self.transactions)
    }
}

/// Encodes block fields as JSON with a fixed field order
///
/// Transaction values are written as raw `f64` bits so every value, including
/// infinities and NaN, encodes distinctly. Encoding in-memory blocks cannot
/// fail; a failure here is a bug.
pub fn serialize_fields(
    nonce: u64,
    previous_hash: &BlockHash,
    timestamp: i64,
    transactions: &[Transaction],
) -> Vec<u8> {
    let canonical = CanonicalBlock {
        nonce,
        previous_hash,
        timestamp,
        transactions: transactions.iter().map(CanonicalTransaction::from).collect(),
    };

    serde_json::to_vec(&canonical).expect("block serialization must not fail")
}

/// Hashes block fields without building an owned Block
pub fn compute_hash(
    nonce: u64,
    previous_hash: &BlockHash,
    timestamp: i64,
    transactions: &[Transaction],
) -> BlockHash {
    let body = serialize_fields(nonce, previous_hash, timestamp, transactions);
    BlockHash(Sha256::digest(&body).into())
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block nonce: {}", self.nonce)?;
        writeln!(f, "Block hash: {}", self.hash())?;
        write!(f, "Block previous hash: {}", self.previous_hash)?;

        if self.transactions.is_empty() {
            return Ok(());
        }

        write!(f, "\n======================= Transactions =======================")?;
        for transaction in &self.transactions {
            write!(f, "\n{}\n___________________________", transaction)?;
        }

        Ok(())
    }
}
