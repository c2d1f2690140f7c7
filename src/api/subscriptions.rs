// src/api/subscriptions.rs

use actix_web::{web, HttpResponse};
use serde_json::Value;

use super::purchases::{ListRequest, UserProductRequest};
use crate::error::ApiError;
use crate::{response, subscriptions, validation, AppState};

#[utoipa::path(
    post,
    path = "/checkUserSubscribed",
    tag = "subscriptions",
    request_body = UserProductRequest,
    responses(
        (status = 200, description = "Subscription status; a lapsed subscription is expired on the way"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn check_user_subscribed(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: UserProductRequest = validation::parse_request("checkUserSubscribed", body.into_inner())?;
    let check =
        subscriptions::check_subscribed(&state, &req.project_name, &req.user_id, &req.product_id).await?;
    Ok(response::success("User subscription status retrieved", Some(check)))
}

#[utoipa::path(
    post,
    path = "/cancelSubscription",
    tag = "subscriptions",
    request_body = UserProductRequest,
    responses(
        (status = 200, description = "Subscription cancelled, no refund issued"),
        (status = 404, description = "Project not found or no active subscription")
    )
)]
pub async fn cancel_subscription(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: UserProductRequest = validation::parse_request("cancelSubscription", body.into_inner())?;
    let cancelled =
        subscriptions::cancel_subscription(&state, &req.project_name, &req.user_id, &req.product_id).await?;
    Ok(response::success("Subscription cancelled successfully", Some(cancelled)))
}

#[utoipa::path(
    post,
    path = "/getSubscriptions",
    tag = "subscriptions",
    request_body = ListRequest,
    responses(
        (status = 200, description = "Subscriptions of the project, with their store key as id"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_subscriptions(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: ListRequest = validation::parse_request("getSubscriptions", body.into_inner())?;
    let subs = subscriptions::list_subscriptions(&state, &req.project_name, req.user_id.as_deref()).await?;
    Ok(response::success("Subscriptions retrieved successfully", Some(subs)))
}
