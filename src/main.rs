use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use simple_ledger::api::{self, LedgerState};
use simple_ledger::blockchain::{self, Ledger};
use simple_ledger::config::{MiningConfig, ServerConfig};

// Replay the reference scenario on a throwaway ledger and log the outcome
fn run_demo(config: &MiningConfig) {
    let mut ledger = match Ledger::with_config("myBlockChainAddress", config.clone()) {
        Ok(ledger) => ledger,
        Err(err) => {
            error!("Failed to create demo ledger: {}", err);
            return;
        }
    };

    ledger.add_transaction("A", "B", 1.0);
    ledger.mine();

    ledger.add_transaction("C", "D", 2.0);
    ledger.add_transaction("E", "F", 3.0);
    ledger.mine();

    info!("Demo chain:\n{}", ledger);

    for address in ["C", "D", "A"] {
        info!("{} {:.1}", address, ledger.balance_of(address));
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::validate_chain,
        api::handlers::get_balance,
        api::handlers::create_wallet
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            api::handlers::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineResponse,
            api::handlers::BalanceResponse,
            api::handlers::WalletResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A minimal proof-of-work ledger API",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

    run_demo(&config.mining);

    let ledger = Ledger::with_config(config.address.clone(), config.mining.clone())
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let ledger = web::Data::new(LedgerState::new(ledger));

    info!(
        "Starting HTTP server at http://{}:{} (rewards to {}, difficulty {})",
        config.host, config.port, config.address, config.mining.difficulty
    );

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
