use log::{debug, info};
use thiserror::Error;

use std::fmt;

use super::block::{Block, BlockHash};
use super::pow;
use super::transaction::Transaction;
use crate::config::{ConfigError, MiningConfig};

/// Errors reported when checking a chain
#[derive(Debug, Error, PartialEq)]
pub enum ChainError {
    #[error("Invalid genesis block")]
    InvalidGenesis,

    #[error("Block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: usize },

    #[error("Block {index} has an invalid proof of work (nonce {nonce})")]
    InvalidProof { index: usize, nonce: u64 },

    #[error("Proof was found against a stale chain tip or pool")]
    StaleProof,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Everything a proof search needs, detached from the ledger
///
/// Lets the search run without holding any lock on the ledger. The job is
/// sealed against its own snapshot, so transactions queued while it runs
/// stay pending for the next block.
#[derive(Debug, Clone, PartialEq)]
pub struct MiningJob {
    /// Hash of the chain tip the proof extends
    pub previous_hash: BlockHash,

    /// Snapshot of the pool, reward included
    pub transactions: Vec<Transaction>,

    /// Required leading zero hex characters
    pub difficulty: usize,

    /// Threads used for the search
    pub workers: usize,
}

impl MiningJob {
    /// Runs the proof of work search for this job
    pub fn solve(&self) -> u64 {
        pow::search_parallel(
            &self.previous_hash,
            &self.transactions,
            self.difficulty,
            self.workers,
        )
    }
}

/// An append-only chain of blocks plus the pool of pending transactions
///
/// The chain always starts with a genesis block and only grows through
/// `create_block`. The pool is owned here and only ever handed out as copies.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Address credited with mining rewards
    address: String,

    /// The chain of blocks
    blocks: Vec<Block>,

    /// Pending transactions to be included in the next block
    pending_pool: Vec<Transaction>,

    /// Mining parameters
    config: MiningConfig,
}

impl Ledger {
    /// Creates a new ledger with the default mining configuration
    ///
    /// # Arguments
    ///
    /// * `address` - The address receiving mining rewards
    ///
    /// # Returns
    ///
    /// A new Ledger holding only the genesis block
    pub fn new(address: impl Into<String>) -> Self {
        Ledger {
            address: address.into(),
            blocks: vec![Block::genesis()],
            pending_pool: Vec::new(),
            config: MiningConfig::default(),
        }
    }

    /// Creates a new ledger with an explicit mining configuration
    pub fn with_config(
        address: impl Into<String>,
        config: MiningConfig,
    ) -> Result<Self, ChainError> {
        config.validate()?;

        Ok(Ledger {
            config,
            ..Ledger::new(address)
        })
    }

    /// The address receiving mining rewards
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The mining configuration bound to this ledger
    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Adds a new transaction to the pending pool
    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        value: f64,
    ) {
        let transaction = Transaction::new(sender, receiver, value);
        debug!(
            "Queued transaction {} -> {} ({})",
            transaction.sender, transaction.receiver, transaction.value
        );
        self.pending_pool.push(transaction);
    }

    /// Returns an independent copy of the pending pool
    pub fn copy_pending_pool(&self) -> Vec<Transaction> {
        self.pending_pool.clone()
    }

    /// Number of transactions waiting in the pool
    pub fn pending_len(&self) -> usize {
        self.pending_pool.len()
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        // The chain is created with a genesis block and never shrinks
        &self.blocks[self.blocks.len() - 1]
    }

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a ledger holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Seals the live pool into a new block and appends it
    ///
    /// # Arguments
    ///
    /// * `nonce` - The proof of work found for the block
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn create_block(&mut self, nonce: u64) -> &Block {
        let previous_hash = self.last_block().hash();
        let transactions = std::mem::take(&mut self.pending_pool);
        let block = Block::new(nonce, previous_hash, transactions);

        info!(
            "Sealed block {} with {} transactions (nonce {})",
            self.blocks.len(),
            block.transactions.len(),
            nonce
        );

        self.blocks.push(block);
        self.last_block()
    }

    /// Finds a nonce for the current pool against the last block
    pub fn proof_of_work(&self) -> u64 {
        self.snapshot_job().solve()
    }

    fn snapshot_job(&self) -> MiningJob {
        MiningJob {
            previous_hash: self.last_hash(),
            transactions: self.copy_pending_pool(),
            difficulty: self.config.difficulty,
            workers: self.config.workers,
        }
    }

    fn queue_reward(&mut self) {
        let sender = self.config.reward_sender.clone();
        let receiver = self.address.clone();
        self.add_transaction(sender, receiver, self.config.reward);
    }

    /// Rewards this ledger's address, finds a proof and seals a new block
    ///
    /// Takes `&mut self` for the whole operation, so the pool cannot change
    /// between the proof search and sealing.
    pub fn mine(&mut self) -> bool {
        self.queue_reward();

        let nonce = self.proof_of_work();
        self.create_block(nonce);

        true
    }

    /// Queues the mining reward and snapshots the pool for a detached search
    ///
    /// Pair with `MiningJob::solve` and `seal` when the search must run
    /// without exclusive access to the ledger.
    pub fn begin_mining(&mut self) -> MiningJob {
        self.queue_reward();
        self.snapshot_job()
    }

    /// Seals a solved job, moving exactly its snapshot out of the pool
    ///
    /// Fails with `StaleProof` if the chain tip moved or the pool no longer
    /// starts with the snapshot; the proof would not hold for the new state.
    pub fn seal(&mut self, job: &MiningJob, nonce: u64) -> Result<&Block, ChainError> {
        let pool_matches = self.pending_pool.len() >= job.transactions.len()
            && self
                .pending_pool
                .iter()
                .zip(&job.transactions)
                .all(|(pending, snapshot)| pending.is_identical(snapshot));

        if self.last_hash() != job.previous_hash || !pool_matches {
            return Err(ChainError::StaleProof);
        }

        let transactions: Vec<Transaction> =
            self.pending_pool.drain(..job.transactions.len()).collect();
        let block = Block::new(nonce, job.previous_hash, transactions);

        info!(
            "Sealed block {} with {} transactions (nonce {}, {} still pending)",
            self.blocks.len(),
            block.transactions.len(),
            nonce,
            self.pending_pool.len()
        );

        self.blocks.push(block);
        Ok(self.last_block())
    }

    /// Net amount received minus sent by `address` across the whole chain
    pub fn balance_of(&self, address: &str) -> f64 {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .map(|transaction| transaction.balance_delta(address))
            .sum()
    }

    /// Total of all mining rewards sealed in the chain
    pub fn total_rewards(&self) -> f64 {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|transaction| transaction.sender == self.config.reward_sender)
            .map(|transaction| transaction.value)
            .sum()
    }

    /// Checks genesis, hash links and every proof of work
    pub fn validate(&self) -> Result<(), ChainError> {
        if !self.blocks[0].is_genesis() {
            return Err(ChainError::InvalidGenesis);
        }

        for index in 1..self.blocks.len() {
            let current_block = &self.blocks[index];
            let previous_block = &self.blocks[index - 1];

            if current_block.previous_hash != previous_block.hash() {
                return Err(ChainError::BrokenLink { index });
            }

            if !pow::valid_proof(
                current_block.nonce,
                &current_block.previous_hash,
                &current_block.transactions,
                self.config.difficulty,
            ) {
                return Err(ChainError::InvalidProof {
                    index,
                    nonce: current_block.nonce,
                });
            }
        }

        Ok(())
    }

    /// Validates the chain
    ///
    /// # Returns
    ///
    /// true if the chain is valid, false otherwise
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Hash of the most recent block
    pub fn last_hash(&self) -> BlockHash {
        self.last_block().hash()
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            writeln!(f, "--------------------------- chain {} ---------------------------", index)?;
            writeln!(f, "{}", block)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ledger(address: &str) -> Ledger {
        Ledger::with_config(address, MiningConfig::default().with_difficulty(1)).unwrap()
    }

    #[test]
    fn test_new_ledger() {
        let ledger = Ledger::new("myAddr");

        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_empty());
        assert_eq!(ledger.address(), "myAddr");
        assert_eq!(ledger.pending_len(), 0);

        let genesis = ledger.last_block();
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.previous_hash, BlockHash::ZERO);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn test_add_transaction() {
        let mut ledger = test_ledger("myAddr");
        ledger.add_transaction("A", "B", 1.0);
        ledger.add_transaction("C", "D", -3.0);

        assert_eq!(
            ledger.copy_pending_pool(),
            vec![Transaction::new("A", "B", 1.0), Transaction::new("C", "D", -3.0)]
        );
        // Nothing reaches the chain until mining
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_copy_pending_pool_is_independent() {
        let mut ledger = test_ledger("myAddr");
        ledger.add_transaction("A", "B", 1.0);

        let mut snapshot = ledger.copy_pending_pool();
        snapshot[0].value = 99.0;
        snapshot.push(Transaction::new("X", "Y", 5.0));
        ledger.add_transaction("C", "D", 2.0);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].value, 99.0);
        assert_eq!(
            ledger.copy_pending_pool(),
            vec![Transaction::new("A", "B", 1.0), Transaction::new("C", "D", 2.0)]
        );
    }

    #[test]
    fn test_create_block_drains_pool() {
        let mut ledger = test_ledger("myAddr");
        let genesis_hash = ledger.last_hash();
        ledger.add_transaction("A", "B", 1.0);

        let block = ledger.create_block(42).clone();

        assert_eq!(block.nonce, 42);
        assert_eq!(block.previous_hash, genesis_hash);
        assert_eq!(block.transactions, vec![Transaction::new("A", "B", 1.0)]);
        assert_eq!(ledger.pending_len(), 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_mine_block() {
        let mut ledger = test_ledger("myAddr");
        ledger.add_transaction("A", "B", 1.0);
        let previous_hash = ledger.last_hash();

        assert!(ledger.mine());

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.pending_len(), 0);

        let block = ledger.last_block();
        assert_eq!(block.previous_hash, previous_hash);
        assert_eq!(
            block.transactions,
            vec![
                Transaction::new("A", "B", 1.0),
                Transaction::new("THE BLOCKCHAIN", "myAddr", 1.0),
            ]
        );
        assert!(pow::valid_proof(block.nonce, &block.previous_hash, &block.transactions, 1));
    }

    #[test]
    fn test_mine_empty_pool() {
        let mut ledger = test_ledger("myAddr");

        assert!(ledger.mine());
        assert_eq!(ledger.last_block().transactions.len(), 1);
        assert_eq!(ledger.balance_of("myAddr"), 1.0);
    }

    #[test]
    fn test_balances_after_two_blocks() {
        let mut ledger = Ledger::new("myAddr");
        ledger.add_transaction("A", "B", 1.0);
        ledger.mine();
        ledger.add_transaction("C", "D", 2.0);
        ledger.add_transaction("E", "F", 3.0);
        ledger.mine();

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.balance_of("myAddr"), 2.0);
        assert_eq!(ledger.balance_of("A"), -1.0);
        assert_eq!(ledger.balance_of("B"), 1.0);
        assert_eq!(ledger.balance_of("C"), -2.0);
        assert_eq!(ledger.balance_of("D"), 2.0);
        assert_eq!(ledger.balance_of("nobody"), 0.0);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_pending_transactions_do_not_count() {
        let mut ledger = test_ledger("myAddr");
        ledger.add_transaction("A", "B", 4.0);

        assert_eq!(ledger.balance_of("B"), 0.0);
    }

    #[test]
    fn test_balances_are_conserved() {
        let mut ledger = test_ledger("miner");
        ledger.add_transaction("A", "B", 1.5);
        ledger.add_transaction("B", "B", 8.0);
        ledger.mine();
        ledger.add_transaction("B", "C", 0.5);
        ledger.mine();

        let addresses = ["A", "B", "C", "miner", "THE BLOCKCHAIN"];
        let total: f64 = addresses.iter().map(|a| ledger.balance_of(a)).sum();
        assert_eq!(total, 0.0);

        let participants: f64 = addresses[..4].iter().map(|a| ledger.balance_of(a)).sum();
        assert_eq!(participants, ledger.total_rewards());
        assert_eq!(ledger.balance_of("THE BLOCKCHAIN"), -ledger.total_rewards());
    }

    #[test]
    fn test_custom_config() {
        let config = MiningConfig::default().with_difficulty(0).with_reward(50.0);
        let mut ledger = Ledger::with_config("miner", config).unwrap();

        ledger.mine();
        // Difficulty zero accepts the first nonce
        assert_eq!(ledger.last_block().nonce, 0);
        assert_eq!(ledger.balance_of("miner"), 50.0);
    }

    #[test]
    fn test_rejects_unreachable_difficulty() {
        let config = MiningConfig::default().with_difficulty(80);

        assert_eq!(
            Ledger::with_config("miner", config).unwrap_err(),
            ChainError::Config(ConfigError::DifficultyTooHigh(80))
        );
    }

    #[test]
    fn test_parallel_mining_matches_sequential() {
        let mut sequential = test_ledger("miner");
        let mut parallel =
            Ledger::with_config("miner", MiningConfig::default().with_difficulty(1).with_workers(4))
                .unwrap();

        sequential.add_transaction("A", "B", 1.0);
        parallel.add_transaction("A", "B", 1.0);

        assert_eq!(sequential.proof_of_work(), parallel.proof_of_work());
        parallel.mine();
        assert!(parallel.is_valid());
    }

    #[test]
    fn test_validate_detects_tampering() {
        let mut ledger = test_ledger("miner");
        ledger.add_transaction("A", "B", 1.0);
        ledger.mine();
        ledger.mine();
        assert_eq!(ledger.validate(), Ok(()));

        let mut tampered = ledger.clone();
        tampered.blocks[1].transactions[0].value = 1000.0;
        assert!(!tampered.is_valid());

        let mut relinked = ledger.clone();
        relinked.blocks[2].previous_hash = BlockHash([1u8; 32]);
        assert_eq!(relinked.validate(), Err(ChainError::BrokenLink { index: 2 }));

        let mut bad_genesis = ledger.clone();
        bad_genesis.blocks[0].transactions.push(Transaction::new("X", "Y", 1.0));
        assert_eq!(bad_genesis.validate(), Err(ChainError::InvalidGenesis));
    }

    #[test]
    fn test_validate_detects_bad_nonce() {
        let mut ledger = test_ledger("miner");
        ledger.add_transaction("A", "B", 1.0);

        let transactions = ledger.copy_pending_pool();
        let previous_hash = ledger.last_hash();
        let bad_nonce = (0..)
            .find(|nonce| !pow::valid_proof(*nonce, &previous_hash, &transactions, 1))
            .unwrap();
        ledger.create_block(bad_nonce);

        assert_eq!(
            ledger.validate(),
            Err(ChainError::InvalidProof { index: 1, nonce: bad_nonce })
        );
    }

    #[test]
    fn test_detached_mining_keeps_late_transactions() {
        let mut ledger = test_ledger("miner");
        ledger.add_transaction("A", "B", 1.0);

        let job = ledger.begin_mining();
        assert_eq!(job.transactions.len(), 2);

        // Queued while the search runs without the ledger
        ledger.add_transaction("C", "D", 2.0);
        let nonce = job.solve();

        let block = ledger.seal(&job, nonce).unwrap().clone();
        assert_eq!(block.transactions, job.transactions);
        assert_eq!(ledger.copy_pending_pool(), vec![Transaction::new("C", "D", 2.0)]);
        assert!(ledger.is_valid());

        ledger.mine();
        assert_eq!(ledger.balance_of("D"), 2.0);
        assert_eq!(ledger.pending_len(), 0);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_seal_accepts_nan_snapshot() {
        let mut ledger = test_ledger("miner");
        ledger.add_transaction("A", "B", f64::NAN);

        let job = ledger.begin_mining();
        let nonce = job.solve();

        assert!(ledger.seal(&job, nonce).is_ok());
        assert_eq!(ledger.pending_len(), 0);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_seal_rejects_stale_job() {
        let mut ledger = test_ledger("miner");
        let job = ledger.begin_mining();
        let nonce = job.solve();

        // Another block lands first
        ledger.mine();

        assert_eq!(ledger.seal(&job, nonce).unwrap_err(), ChainError::StaleProof);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_display_lists_blocks() {
        let mut ledger = test_ledger("myAddr");
        ledger.add_transaction("A", "B", 1.0);
        ledger.mine();

        let rendered = ledger.to_string();
        assert!(rendered.contains("chain 0"));
        assert!(rendered.contains("chain 1"));
        assert!(rendered.contains("receiver: myAddr"));
    }
}
