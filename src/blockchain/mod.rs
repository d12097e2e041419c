// Blockchain module
//
// This module contains the core ledger implementation including:
// - Transaction structure
// - Block structure and hashing
// - Proof of work search and validation
// - Ledger (chain + pending pool)
// - Address generation

pub mod block;
pub mod chain;
pub mod crypto;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, BlockHash};
pub use chain::{ChainError, Ledger, MiningJob};
pub use crypto::{Address, CryptoError, Wallet};
pub use transaction::Transaction;
