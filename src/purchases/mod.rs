// src/purchases/mod.rs
//
// Purchase operations. The commit path lives in `engine`; this module holds the read side and
// the shapes handed back to callers.

mod engine;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

pub use engine::{submit_purchase, PurchaseIntent};

use crate::catalog::require_product;
use crate::error::ApiError;
use crate::models::{
    Frequency, Keyed, PaymentMethod, ProductType, Purchase, PurchaseStatus, Subscription,
};
use crate::projects::require_project;
use crate::store::{self, paths};
use crate::subscriptions::resolve_at;
use crate::{validation, AppState};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub purchase_id: String,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub product_id: String,
    pub product_type: ProductType,
    pub amount: i64,
    pub currency: String,
    pub country: String,
    pub payment_method: PaymentMethod,
    pub status: PurchaseStatus,
    pub purchase_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paypal_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_end_date: Option<DateTime<Utc>>,
    /// The purchase was committed by an earlier request with the same transaction id.
    pub replayed: bool,
}

impl PurchaseReceipt {
    fn from_purchase(purchase_id: String, purchase: Purchase, replayed: bool) -> Self {
        Self {
            purchase_id,
            transaction_id: purchase.transaction_id,
            payment_id: purchase.payment_id,
            product_id: purchase.product_id,
            product_type: purchase.product_type,
            amount: purchase.amount,
            currency: purchase.currency,
            country: purchase.country,
            payment_method: purchase.payment_method,
            status: purchase.status,
            purchase_date: purchase.purchase_date,
            card_last_four: purchase.card_last_four,
            paypal_email: purchase.paypal_email,
            subscription_id: None,
            subscription_end_date: None,
            replayed,
        }
    }

    pub(crate) fn committed(
        purchase_id: String,
        purchase: Purchase,
        subscription_id: Option<String>,
        subscription: Option<Subscription>,
    ) -> Self {
        Self {
            subscription_id,
            subscription_end_date: subscription.map(|s| s.end_date),
            ..Self::from_purchase(purchase_id, purchase, false)
        }
    }

    pub(crate) fn replayed(purchase_id: String, purchase: Purchase) -> Self {
        Self::from_purchase(purchase_id, purchase, true)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchasableItem {
    pub id: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub price: i64,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
}

/// The completed purchase shown by `checkUserPurchased`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseData {
    pub transaction_id: String,
    pub product_id: String,
    pub product_type: ProductType,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub purchase_date: DateTime<Utc>,
    pub country: String,
    pub status: PurchaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paypal_email: Option<String>,
}

impl From<Purchase> for PurchaseData {
    fn from(p: Purchase) -> Self {
        Self {
            transaction_id: p.transaction_id,
            product_id: p.product_id,
            product_type: p.product_type,
            amount: p.amount,
            currency: p.currency,
            payment_method: p.payment_method,
            purchase_date: p.purchase_date,
            country: p.country,
            status: p.status,
            card_last_four: p.card_last_four,
            paypal_email: p.paypal_email,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCheck {
    pub purchased: bool,
    pub purchase_data: Option<PurchaseData>,
}

async fn completed_purchase(
    state: &AppState,
    project: &str,
    user_id: &str,
    product_id: &str,
) -> Result<Option<Purchase>, ApiError> {
    let purchases = store::query_collection::<Purchase>(
        state.store.as_ref(),
        &paths::purchases(project),
        "userId",
        user_id,
    )
    .await?;
    Ok(purchases
        .into_iter()
        .map(|(_, p)| p)
        .find(|p| p.product_id == product_id && p.is_completed()))
}

/// Pre-flight check a client runs before showing a checkout. Advisory only: the commit repeats
/// every check atomically.
pub async fn validate_item_for_purchase(
    state: &AppState,
    project: &str,
    user_id: &str,
    product_id: &str,
) -> Result<PurchasableItem, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let user_id = validation::user_id(user_id)?;
    let product = require_product(store, project, product_id).await?;
    if !product.is_active() {
        return Err(ApiError::validation(
            "PRODUCT_INACTIVE",
            "Product is not available for purchase",
        ));
    }

    match product.product_type {
        ProductType::OneTime => {
            if completed_purchase(state, project, user_id, &product.product_id)
                .await?
                .is_some()
            {
                return Err(ApiError::conflict("ALREADY_PURCHASED", "Product already purchased"));
            }
        }
        ProductType::Subscription => {
            let check = resolve_at(
                store,
                project,
                user_id,
                &product.product_id,
                Utc::now(),
                state.tx_options(),
            )
            .await?;
            if check.subscribed {
                return Err(ApiError::conflict(
                    "ALREADY_SUBSCRIBED",
                    "User already has active subscription",
                ));
            }
        }
        ProductType::Repurchase => {}
    }

    Ok(PurchasableItem {
        id: product.product_id,
        product_type: product.product_type,
        price: product.price,
        name: product.name,
        description: product.description,
        frequency: product.frequency,
        recurring: product.recurring,
    })
}

pub async fn check_user_purchased(
    state: &AppState,
    project: &str,
    user_id: &str,
    product_id: &str,
) -> Result<PurchaseCheck, ApiError> {
    require_project(state.store.as_ref(), project).await?;
    let user_id = validation::user_id(user_id)?;
    let product_id = validation::product_id(product_id)?;
    let found = completed_purchase(state, project, user_id, product_id).await?;
    Ok(PurchaseCheck {
        purchased: found.is_some(),
        purchase_data: found.map(PurchaseData::from),
    })
}

pub async fn list_purchases(
    state: &AppState,
    project: &str,
    user_id: Option<&str>,
) -> Result<Vec<Keyed<Purchase>>, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let path = paths::purchases(project);
    let purchases = match user_id {
        Some(user_id) => store::query_collection::<Purchase>(store, &path, "userId", user_id).await?,
        None => store::read_collection::<Purchase>(store, &path).await?,
    };
    Ok(purchases
        .into_iter()
        .map(|(id, record)| Keyed { id, record })
        .collect())
}
