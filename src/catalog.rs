// src/catalog.rs
//
// Product directory: plain CRUD over the product nodes of a project.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::models::{Frequency, Keyed, Product, ProductStatus, ProductType};
use crate::projects::require_project;
use crate::store::{self, paths, Store, StoreError};
use crate::{validation, AppState};

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub product_type: String,
    pub price: Value,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub recurring: Option<bool>,
    pub status: Option<String>,
}

/// Fields `updateProduct` may change.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductUpdates {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub price: Option<Value>,
    pub status: Option<String>,
    pub frequency: Option<String>,
    pub recurring: Option<bool>,
}

fn product_type(raw: &str) -> Result<ProductType, ApiError> {
    ProductType::parse(raw).ok_or_else(|| ApiError::validation("INVALID_TYPE", "Invalid product type"))
}

fn product_status(raw: &str) -> Result<ProductStatus, ApiError> {
    ProductStatus::parse(raw)
        .ok_or_else(|| ApiError::validation("INVALID_STATUS", "Status must be active or inactive"))
}

fn frequency(raw: &str) -> Result<Frequency, ApiError> {
    Frequency::parse(raw).ok_or_else(|| {
        ApiError::validation("INVALID_FREQUENCY", "Frequency must be weekly, monthly or yearly")
    })
}

pub async fn get_product(store: &dyn Store, project: &str, product_id: &str) -> Result<Option<Product>, ApiError> {
    let product_id = validation::product_id(product_id)?;
    let snapshot = store.get(&paths::product(project, product_id)).await?;
    Ok(snapshot.decode::<Product>()?)
}

/// Loads a product, failing with `PRODUCT_NOT_FOUND` when absent.
pub async fn require_product(store: &dyn Store, project: &str, product_id: &str) -> Result<Product, ApiError> {
    get_product(store, project, product_id)
        .await?
        .ok_or_else(ApiError::product_not_found)
}

pub async fn add_product(state: &AppState, project: &str, input: NewProduct) -> Result<Product, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;

    let product_id = validation::product_id(&input.name).map_err(|_| {
        ApiError::validation(
            "INVALID_PRODUCT_NAME",
            "Product name cannot contain any of the following characters: . # $ [ ] /",
        )
    })?;

    if get_product(store, project, product_id).await?.is_some() {
        return Err(ApiError::validation("PRODUCT_EXISTS", "Product with this ID already exists"));
    }

    let price = validation::price(&input.price)?;
    let product_type = product_type(&input.product_type)?;
    let status = match input.status.as_deref() {
        Some(raw) => product_status(raw)?,
        None => ProductStatus::Inactive,
    };
    let (frequency, recurring) = if product_type == ProductType::Subscription {
        let frequency = match input.frequency.as_deref() {
            Some(raw) => frequency(raw)?,
            None => Frequency::Monthly,
        };
        (Some(frequency), Some(input.recurring.unwrap_or(false)))
    } else {
        (None, None)
    };

    let now = Utc::now();
    let product = Product {
        product_id: product_id.to_string(),
        name: input.name.clone(),
        description: input.description.unwrap_or_default(),
        product_type,
        price,
        status,
        frequency,
        recurring,
        created_at: now,
        updated_at: now,
    };

    store
        .put(&paths::product(project, product_id), serde_json::to_value(&product).map_err(StoreError::from)?)
        .await?;
    log::info!("product added project={project} product_id={product_id} type={product_type}");

    Ok(product)
}

fn apply_updates(product: &mut Product, updates: &ProductUpdates) -> Result<(), ApiError> {
    if let Some(name) = &updates.name {
        product.name = name.clone();
    }
    if let Some(description) = &updates.description {
        product.description = description.clone();
    }
    if let Some(raw) = &updates.product_type {
        product.product_type = product_type(raw)?;
    }
    if let Some(raw) = &updates.price {
        product.price = validation::price(raw)?;
    }
    if let Some(raw) = &updates.status {
        product.status = product_status(raw)?;
    }
    if let Some(raw) = &updates.frequency {
        product.frequency = Some(frequency(raw)?);
    }
    if let Some(recurring) = updates.recurring {
        product.recurring = Some(recurring);
    }
    if product.product_type == ProductType::Subscription && product.frequency.is_none() {
        product.frequency = Some(Frequency::Monthly);
    }
    Ok(())
}

pub fn parse_updates(raw: &Value) -> Result<ProductUpdates, ApiError> {
    match raw {
        Value::Object(map) if !map.is_empty() => serde_json::from_value(raw.clone())
            .map_err(|e| ApiError::validation("INVALID_UPDATES", format!("Invalid updates: {e}"))),
        _ => Err(ApiError::validation("NO_UPDATES", "No updates provided")),
    }
}

pub async fn update_product(
    state: &AppState,
    project: &str,
    product_id: &str,
    updates: &Value,
) -> Result<Product, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let updates = parse_updates(updates)?;
    let current = require_product(store, project, product_id).await?;

    // Validate once up front so the transaction below cannot fail half way.
    apply_updates(&mut current.clone(), &updates)?;

    let mut updated: Option<Product> = None;
    let outcome = store::update::<Product, _>(
        store,
        &paths::product(project, product_id),
        state.tx_options(),
        |current| {
            let mut product = current?;
            apply_updates(&mut product, &updates).ok()?;
            product.updated_at = Utc::now();
            updated = Some(product.clone());
            Some(product)
        },
    )
    .await?;

    match (outcome.committed, updated) {
        (true, Some(product)) => Ok(product),
        _ => Err(ApiError::product_not_found()),
    }
}

pub async fn delete_product(state: &AppState, project: &str, product_id: &str) -> Result<(), ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    require_product(store, project, product_id).await?;
    store.remove(&paths::product(project, product_id)).await?;
    log::info!("product deleted project={project} product_id={product_id}");
    Ok(())
}

pub async fn list_products(state: &AppState, project: &str) -> Result<Vec<Keyed<Product>>, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let products = store::read_collection::<Product>(store, &paths::products(project)).await?;
    Ok(products
        .into_iter()
        .map(|(id, record)| Keyed { id, record })
        .collect())
}
