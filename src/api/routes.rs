use actix_web::{error, web, HttpRequest, HttpResponse};
use log::warn;

use super::handlers;

/// Logs rejected request bodies and answers with a JSON error
fn json_error_handler(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected request body for {}: {}", req.path(), err);

    let response = HttpResponse::BadRequest().json(serde_json::json!({
        "error": format!("Invalid request body: {}", err)
    }));
    error::InternalError::from_response(err, response).into()
}

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(
            web::scope("/api/v1")
                .route("/chain", web::get().to(handlers::get_chain))
                .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
                .route("/transactions/new", web::post().to(handlers::new_transaction))
                .route("/mine", web::post().to(handlers::mine_block))
                .route("/validate", web::get().to(handlers::validate_chain))
                .route("/balance/{address}", web::get().to(handlers::get_balance))
                .route("/wallet/new", web::post().to(handlers::create_wallet)),
        );
}
