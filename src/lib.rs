//! A minimal single-node proof-of-work ledger
//!
//! Callers queue transactions on a [`Ledger`](blockchain::Ledger), then mine
//! to seal them into a new block together with a reward for the ledger's own
//! address. Balances are derived by scanning every sealed transaction.

pub mod api;
pub mod blockchain;
pub mod config;
