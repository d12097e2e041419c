use log::debug;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use super::block::{compute_hash, BlockHash};
use super::transaction::Transaction;

/// Timestamp used for proof candidates, so validity never depends on when
/// a candidate was built
const CANDIDATE_TIMESTAMP: i64 = 0;

/// How often the search loops report progress
const PROGRESS_INTERVAL: u64 = 100_000;

/// Checks whether `nonce` solves the puzzle for the given block contents
///
/// # Arguments
///
/// * `nonce` - The candidate nonce
/// * `previous_hash` - The hash of the block being extended
/// * `transactions` - The transactions the block will seal
/// * `difficulty` - Number of leading '0' hex characters required
///
/// # Returns
///
/// true if the candidate block's hash has `difficulty` leading zero characters
pub fn valid_proof(
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    compute_hash(nonce, previous_hash, CANDIDATE_TIMESTAMP, transactions)
        .has_leading_zeros(difficulty)
}

/// Finds the smallest nonce satisfying `valid_proof`
///
/// Counts up from zero and blocks the calling thread until a nonce is found.
pub fn search(previous_hash: &BlockHash, transactions: &[Transaction], difficulty: usize) -> u64 {
    let mut nonce: u64 = 0;

    while !valid_proof(nonce, previous_hash, transactions, difficulty) {
        nonce += 1;

        if nonce % PROGRESS_INTERVAL == 0 {
            debug!("Proof of work: {} nonces tried (difficulty: {})", nonce, difficulty);
        }
    }

    debug!("Found nonce {} at difficulty {}", nonce, difficulty);
    nonce
}

/// Finds the smallest satisfying nonce using several worker threads
///
/// Worker `i` checks nonces `i, i + workers, i + 2 * workers, ...`. The lowest
/// success so far is kept in a shared minimum and a stop flag is raised on the
/// first one; a worker keeps going only while its candidates are below that
/// minimum, so the result is the same nonce `search` would return.
pub fn search_parallel(
    previous_hash: &BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
    workers: usize,
) -> u64 {
    let workers = workers.max(1);
    if workers == 1 {
        return search(previous_hash, transactions, difficulty);
    }

    let best = AtomicU64::new(u64::MAX);
    let found = AtomicBool::new(false);

    thread::scope(|scope| {
        for worker in 0..workers {
            let best = &best;
            let found = &found;

            scope.spawn(move || {
                let step = workers as u64;
                let mut nonce = worker as u64;

                loop {
                    if found.load(Ordering::Acquire) && nonce >= best.load(Ordering::Acquire) {
                        break;
                    }

                    if valid_proof(nonce, previous_hash, transactions, difficulty) {
                        best.fetch_min(nonce, Ordering::AcqRel);
                        found.store(true, Ordering::Release);
                        break;
                    }

                    nonce = match nonce.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
            });
        }
    });

    let nonce = best.load(Ordering::Acquire);
    debug!(
        "Found nonce {} at difficulty {} with {} workers",
        nonce, difficulty, workers
    );
    nonce
}
