// src/api/projects.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::{projects, response, validation, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeProjectRequest {
    pub project_name: String,
}

#[utoipa::path(
    post,
    path = "/initializeProject",
    tag = "projects",
    request_body = InitializeProjectRequest,
    responses(
        (status = 200, description = "Project created, or already there"),
        (status = 400, description = "Missing field or invalid project name"),
        (status = 500, description = "Store error")
    )
)]
pub async fn initialize_project(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let req: InitializeProjectRequest =
        validation::parse_request("initializeProject", body.into_inner())?;
    let initialized = projects::initialize_project(&state, &req.project_name).await?;
    Ok(response::success("Project initialized successfully", Some(initialized)))
}
