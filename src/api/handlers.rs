use actix_web::{web, HttpResponse, Responder};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::blockchain::{Block, ChainError, Ledger, Transaction, Wallet};

/// Ledger shared between request handlers
///
/// The ledger lock is only held for short reads and mutations. Mining takes
/// a separate lock so one proof search runs at a time while the ledger stays
/// available to every other request.
pub struct LedgerState {
    ledger: Mutex<Ledger>,
    mining: Mutex<()>,
}

/// Data structure for the shared ledger state
pub type LedgerData = web::Data<LedgerState>;

impl LedgerState {
    /// Wraps a ledger for sharing between handlers
    pub fn new(ledger: Ledger) -> Self {
        LedgerState {
            ledger: Mutex::new(ledger),
            mining: Mutex::new(()),
        }
    }

    /// Locks the ledger, recovering the guard if a previous holder panicked
    ///
    /// Every ledger mutation runs to completion under this lock, so the chain
    /// and pool stay consistent even after a poisoned request.
    pub fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mines one block without holding the ledger lock during the search
    ///
    /// The block seals the snapshot taken when mining started; transactions
    /// queued during the search stay pending for the next block.
    pub fn mine(&self) -> Result<Block, ChainError> {
        let _mining = self.mining.lock().unwrap_or_else(PoisonError::into_inner);

        let job = self.lock().begin_mining();
        let nonce = job.solve();

        let mut ledger = self.lock();
        let block = ledger.seal(&job, nonce)?;
        Ok(block.clone())
    }
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender: String,

    /// The receiver's address
    pub receiver: String,

    /// The amount to transfer
    #[serde(with = "crate::blockchain::transaction::lossless_f64")]
    pub value: f64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The index of the block that will include this transaction
    pub block_index: usize,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// The queried address
    pub address: String,

    /// Net amount received minus sent
    pub balance: f64,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's public key (hex encoded)
    pub public_key: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Get the full chain
///
/// Returns every block and the chain's validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(state: LedgerData) -> impl Responder {
    let ledger = state.lock();
    let chain = ledger.blocks().to_vec();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid: ledger.is_valid(),
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (
            status = 200,
            description = "Pending transactions retrieved successfully",
            body = Vec<Transaction>
        )
    )
)]
pub async fn get_pending_transactions(state: LedgerData) -> impl Responder {
    let transactions: Vec<Transaction> = state.lock().copy_pending_pool();
    HttpResponse::Ok().json(transactions)
}

/// Create a new transaction
///
/// Adds a new transaction to the pending pool. Values are not checked
/// against the sender's balance.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data")
    )
)]
pub async fn new_transaction(
    state: LedgerData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let TransactionRequest {
        sender,
        receiver,
        value,
    } = transaction_req.into_inner();

    let mut ledger = state.lock();
    ledger.add_transaction(sender, receiver, value);

    let response = TransactionResponse {
        message: "Transaction will be added to Block".to_string(),
        block_index: ledger.len(),
    };

    HttpResponse::Created().json(response)
}

/// Mine a new block
///
/// Seals all pending transactions plus a reward for the ledger's address
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 409, description = "Chain changed during the search"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(state: LedgerData) -> impl Responder {
    // The search is CPU bound, keep it off the async workers
    let result = web::block(move || state.mine()).await;

    match result {
        Ok(Ok(block)) => {
            info!("Mined block with nonce {} via API", block.nonce);

            let response = MineResponse {
                message: "New Block Mined".to_string(),
                block,
            };

            HttpResponse::Ok().json(response)
        }
        Ok(Err(err)) => {
            warn!("Mined proof could not be sealed: {}", err);
            HttpResponse::Conflict().json(serde_json::json!({
                "error": format!("Failed to seal block: {}", err)
            }))
        }
        Err(err) => {
            warn!("Mining task failed: {}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to mine block: {}", err)
            }))
        }
    }
}

/// Check if the chain is valid
///
/// Re-checks every hash link and proof of work
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Chain validation status", body = bool)
    )
)]
pub async fn validate_chain(state: LedgerData) -> impl Responder {
    let ledger = state.lock();

    if let Err(err) = ledger.validate() {
        warn!("Chain validation failed: {}", err);
        return HttpResponse::Ok().json(false);
    }

    HttpResponse::Ok().json(true)
}

/// Get the balance of an address
///
/// Sums every sealed transaction received by or sent from the address
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to query")
    ),
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_balance(state: LedgerData, address: web::Path<String>) -> impl Responder {
    let address = address.into_inner();
    let balance = state.lock().balance_of(&address);

    HttpResponse::Ok().json(BalanceResponse { address, balance })
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();

    let response = WalletResponse {
        address: wallet.address().to_string(),
        public_key: wallet.public_key_hex(),
        private_key: wallet.private_key_hex(),
    };

    HttpResponse::Created().json(response)
}
