// src/api/analytics.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::analytics::{self, AnalyticsReport};
use crate::error::ApiError;
use crate::{response, validation, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryRequest {
    pub project_name: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRequest {
    pub project_name: String,
    /// RFC 3339 or `YYYY-MM-DD`, inclusive.
    pub start_date: Option<String>,
    /// RFC 3339 or `YYYY-MM-DD`, inclusive.
    pub end_date: Option<String>,
}

#[utoipa::path(
    post,
    path = "/getUserSummary",
    tag = "analytics",
    request_body = UserSummaryRequest,
    responses(
        (status = 200, description = "Completed purchases and active subscriptions of the user"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_user_summary(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: UserSummaryRequest = validation::parse_request("getUserSummary", body.into_inner())?;
    let summary = analytics::user_summary(&state, &req.project_name, &req.user_id).await?;
    Ok(response::success("User summary retrieved successfully", Some(summary)))
}

#[utoipa::path(
    post,
    path = "/getProjectAnalytics",
    tag = "analytics",
    request_body = AnalyticsRequest,
    responses(
        (status = 200, description = "Revenue report", body = AnalyticsReport),
        (status = 400, description = "INVALID_DATE"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project_analytics(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: AnalyticsRequest = validation::parse_request("getProjectAnalytics", body.into_inner())?;
    let report = analytics::project_analytics(
        &state,
        &req.project_name,
        req.start_date.as_deref(),
        req.end_date.as_deref(),
    )
    .await?;
    Ok(response::success("Project analytics retrieved successfully", Some(report)))
}
