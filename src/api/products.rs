// src/api/products.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::catalog::{self, NewProduct};
use crate::error::ApiError;
use crate::models::Product;
use crate::{response, validation, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    pub project_name: String,
    /// Also the product id.
    pub name: String,
    /// `one-time`, `subscription` or `repurchase`.
    #[serde(rename = "type")]
    pub product_type: String,
    /// Positive integer, or a string holding one.
    #[schema(value_type = i64)]
    pub price: Value,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub recurring: Option<bool>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub project_name: String,
    pub product_id: String,
    #[schema(value_type = Object)]
    pub updates: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub project_name: String,
    pub product_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub project_name: String,
}

#[utoipa::path(
    post,
    path = "/addProduct",
    tag = "products",
    request_body = AddProductRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "PRODUCT_EXISTS, INVALID_PRICE, INVALID_TYPE or a missing field"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn add_product(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: AddProductRequest = validation::parse_request("addProduct", body.into_inner())?;
    let product = catalog::add_product(
        &state,
        &req.project_name,
        NewProduct {
            name: req.name,
            product_type: req.product_type,
            price: req.price,
            description: req.description,
            frequency: req.frequency,
            recurring: req.recurring,
            status: req.status,
        },
    )
    .await?;
    Ok(response::created("Product added successfully", product))
}

#[utoipa::path(
    post,
    path = "/updateProduct",
    tag = "products",
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "NO_UPDATES or an invalid field"),
        (status = 404, description = "Project or product not found")
    )
)]
pub async fn update_product(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: UpdateProductRequest = validation::parse_request("updateProduct", body.into_inner())?;
    let product = catalog::update_product(&state, &req.project_name, &req.product_id, &req.updates).await?;
    Ok(response::success("Product updated successfully", Some(product)))
}

#[utoipa::path(
    post,
    path = "/deleteProduct",
    tag = "products",
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Project or product not found")
    )
)]
pub async fn delete_product(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: ProductRequest = validation::parse_request("deleteProduct", body.into_inner())?;
    catalog::delete_product(&state, &req.project_name, &req.product_id).await?;
    Ok(response::message("Product deleted successfully"))
}

#[utoipa::path(
    post,
    path = "/getProducts",
    tag = "products",
    request_body = ProjectRequest,
    responses(
        (status = 200, description = "Products of the project, keyed by id"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_products(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, ApiError> {
    let req: ProjectRequest = validation::parse_request("getProducts", body.into_inner())?;
    let products = catalog::list_products(&state, &req.project_name).await?;
    Ok(response::success("Products retrieved successfully", Some(products)))
}
