// API module
//
// This module exposes a single in-process ledger over HTTP

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use handlers::{LedgerData, LedgerState};
pub use routes::configure_routes;
