// src/api/purchases.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::purchases::{self, PurchasableItem, PurchaseCheck, PurchaseIntent, PurchaseReceipt};
use crate::validation::{self, CardData, PaypalData};
use crate::{response, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProductRequest {
    pub project_name: String,
    pub product_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPurchaseRequest {
    pub project_name: String,
    pub user_id: String,
    pub product_id: String,
    /// `card` or `paypal`.
    pub payment_method: String,
    pub card_data: Option<CardData>,
    pub paypal_data: Option<PaypalData>,
    /// ISO country code. Defaults to the configured country.
    pub country: Option<String>,
    /// Idempotency key. Resubmitting with the same value never charges twice.
    pub transaction_id: Option<String>,
}

impl From<ProcessPurchaseRequest> for PurchaseIntent {
    fn from(req: ProcessPurchaseRequest) -> Self {
        Self {
            project: req.project_name,
            user_id: req.user_id,
            product_id: req.product_id,
            payment_method: req.payment_method,
            card_data: req.card_data,
            paypal_data: req.paypal_data,
            country: req.country,
            transaction_id: req.transaction_id,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub project_name: String,
    /// Only records of this user.
    pub user_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/validateItemForPurchase",
    tag = "purchases",
    request_body = UserProductRequest,
    responses(
        (status = 200, description = "Product can be bought by this user", body = PurchasableItem),
        (status = 400, description = "PRODUCT_INACTIVE, ALREADY_PURCHASED or ALREADY_SUBSCRIBED"),
        (status = 404, description = "Project or product not found")
    )
)]
pub async fn validate_item_for_purchase(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: UserProductRequest = validation::parse_request("validateItemForPurchase", body.into_inner())?;
    let item =
        purchases::validate_item_for_purchase(&state, &req.project_name, &req.user_id, &req.product_id).await?;
    Ok(response::success("Item is available for purchase", Some(item)))
}

#[utoipa::path(
    post,
    path = "/processPurchase",
    tag = "purchases",
    request_body = ProcessPurchaseRequest,
    responses(
        (status = 200, description = "Payment authorized and purchase recorded", body = PurchaseReceipt),
        (status = 400, description = "Invalid payment data, declined payment, ALREADY_PURCHASED or ALREADY_SUBSCRIBED"),
        (status = 404, description = "Project or product not found"),
        (status = 500, description = "Store or gateway failure; any authorization was voided")
    )
)]
pub async fn process_purchase(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: ProcessPurchaseRequest = validation::parse_request("processPurchase", body.into_inner())?;
    let receipt = purchases::submit_purchase(&state, req.into()).await?;
    let message = if receipt.replayed {
        "Purchase already processed"
    } else {
        "Purchase processed successfully"
    };
    Ok(response::success(message, Some(receipt)))
}

#[utoipa::path(
    post,
    path = "/checkUserPurchased",
    tag = "purchases",
    request_body = UserProductRequest,
    responses(
        (status = 200, description = "Purchase status of the user for the product", body = PurchaseCheck),
        (status = 404, description = "Project not found")
    )
)]
pub async fn check_user_purchased(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: UserProductRequest = validation::parse_request("checkUserPurchased", body.into_inner())?;
    let check = purchases::check_user_purchased(&state, &req.project_name, &req.user_id, &req.product_id).await?;
    Ok(response::success("User purchase status retrieved", Some(check)))
}

#[utoipa::path(
    post,
    path = "/getPurchases",
    tag = "purchases",
    request_body = ListRequest,
    responses(
        (status = 200, description = "Purchases of the project, with their store key as id"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_purchases(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: ListRequest = validation::parse_request("getPurchases", body.into_inner())?;
    let purchases = purchases::list_purchases(&state, &req.project_name, req.user_id.as_deref()).await?;
    Ok(response::success("Purchases retrieved successfully", Some(purchases)))
}
