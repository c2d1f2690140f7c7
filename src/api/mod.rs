// src/api/mod.rs
//
// One POST endpoint per operation, mounted at `/<operationName>`.

pub mod analytics;
pub mod products;
pub mod projects;
pub mod purchases;
pub mod subscriptions;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, FromRequest, Handler, HttpRequest, Responder, ResponseError};

use crate::error::ApiError;

/// Request bodies larger than this are rejected as invalid JSON.
const JSON_LIMIT: usize = 64 * 1024;

async fn method_not_allowed() -> Result<web::Json<()>, ApiError> {
    Err(ApiError::MethodNotAllowed)
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let api = ApiError::validation("INVALID_JSON", format!("Invalid JSON body: {err}"));
    InternalError::from_response(err, api.error_response()).into()
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(json_error)
}

fn post<F, Args>(cfg: &mut web::ServiceConfig, path: &str, handler: F)
where
    F: Handler<Args>,
    Args: FromRequest + 'static,
    F::Output: Responder + 'static,
{
    cfg.service(
        web::resource(path)
            .route(web::post().to(handler))
            .default_service(web::to(method_not_allowed)),
    );
}

/// Registers every operation on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());

    post(cfg, "/initializeProject", projects::initialize_project);

    post(cfg, "/addProduct", products::add_product);
    post(cfg, "/updateProduct", products::update_product);
    post(cfg, "/deleteProduct", products::delete_product);
    post(cfg, "/getProducts", products::get_products);

    post(cfg, "/validateItemForPurchase", purchases::validate_item_for_purchase);
    post(cfg, "/processPurchase", purchases::process_purchase);
    post(cfg, "/checkUserPurchased", purchases::check_user_purchased);
    post(cfg, "/getPurchases", purchases::get_purchases);

    post(cfg, "/checkUserSubscribed", subscriptions::check_user_subscribed);
    post(cfg, "/cancelSubscription", subscriptions::cancel_subscription);
    post(cfg, "/getSubscriptions", subscriptions::get_subscriptions);

    post(cfg, "/getUserSummary", analytics::get_user_summary);
    post(cfg, "/getProjectAnalytics", analytics::get_project_analytics);
}
