// src/subscriptions.rs
//
// Subscription status reads. An `active` record whose end date has passed is moved to
// `expired` by whichever reader sees it first; the transition is guarded so it happens once.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{Keyed, Subscription, SubscriptionStatus};
use crate::projects::require_project;
use crate::store::{self, paths, Store, StoreResult, TxOptions};
use crate::{validation, AppState};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSubscription {
    pub subscription_id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredSubscription {
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub expired_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubscriptionDetails {
    Active(ActiveSubscription),
    Expired(ExpiredSubscription),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheck {
    pub subscribed: bool,
    pub subscription_details: Option<SubscriptionDetails>,
    /// This call performed the active -> expired transition.
    #[serde(skip)]
    pub transitioned: bool,
}

impl SubscriptionCheck {
    fn none() -> Self {
        Self {
            subscribed: false,
            subscription_details: None,
            transitioned: false,
        }
    }
}

/// Whole days left, rounded up.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (end - now).num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    (ms + MS_PER_DAY - 1) / MS_PER_DAY
}

/// Moves one subscription from `active` to `status` if it is still active. Returns whether
/// this call made the change.
pub async fn transition_if_active(
    store: &dyn Store,
    project: &str,
    key: &str,
    status: SubscriptionStatus,
    now: DateTime<Utc>,
    options: TxOptions,
) -> StoreResult<bool> {
    let outcome = store::update::<Subscription, _>(
        store,
        &paths::subscription(project, key),
        options,
        |current| {
            let mut sub = current?;
            if !sub.is_active() {
                return None;
            }
            sub.status = status;
            sub.updated_at = now;
            if status == SubscriptionStatus::Cancelled {
                sub.cancelled_at = Some(now);
            }
            Some(sub)
        },
    )
    .await?;
    Ok(outcome.committed)
}

async fn find_active(
    store: &dyn Store,
    project: &str,
    user_id: &str,
    product_id: &str,
) -> StoreResult<Option<(String, Subscription)>> {
    let subs = store::query_collection::<Subscription>(
        store,
        &paths::subscriptions(project),
        "userId",
        user_id,
    )
    .await?;
    Ok(subs
        .into_iter()
        .find(|(_, s)| s.product_id == product_id && s.is_active()))
}

/// Expiry resolver against an explicit clock.
pub async fn resolve_at(
    store: &dyn Store,
    project: &str,
    user_id: &str,
    product_id: &str,
    now: DateTime<Utc>,
    options: TxOptions,
) -> StoreResult<SubscriptionCheck> {
    let Some((key, sub)) = find_active(store, project, user_id, product_id).await? else {
        return Ok(SubscriptionCheck::none());
    };

    if sub.end_date < now {
        let transitioned =
            transition_if_active(store, project, &key, SubscriptionStatus::Expired, now, options).await?;
        if transitioned {
            log::info!(
                "subscription expired project={project} user_id={user_id} product_id={product_id} key={key}"
            );
        }
        return Ok(SubscriptionCheck {
            subscribed: false,
            subscription_details: Some(SubscriptionDetails::Expired(ExpiredSubscription {
                subscription_id: key,
                status: SubscriptionStatus::Expired,
                expired_date: sub.end_date,
            })),
            transitioned,
        });
    }

    Ok(SubscriptionCheck {
        subscribed: true,
        subscription_details: Some(SubscriptionDetails::Active(ActiveSubscription {
            days_remaining: days_remaining(sub.end_date, now),
            subscription_id: key,
            transaction_id: sub.transaction_id,
            product_id: sub.product_id,
            amount: sub.amount,
            currency: sub.currency,
            payment_method: sub.payment_method.to_string(),
            start_date: sub.start_date,
            end_date: sub.end_date,
            status: sub.status,
        })),
        transitioned: false,
    })
}

pub async fn check_subscribed(
    state: &AppState,
    project: &str,
    user_id: &str,
    product_id: &str,
) -> Result<SubscriptionCheck, ApiError> {
    require_project(state.store.as_ref(), project).await?;
    let user_id = validation::user_id(user_id)?;
    let product_id = validation::product_id(product_id)?;
    Ok(resolve_at(
        state.store.as_ref(),
        project,
        user_id,
        product_id,
        Utc::now(),
        state.tx_options(),
    )
    .await?)
}

/// Cancels the user's active subscription to a product. A subscription whose period is
/// already over is expired instead.
pub async fn cancel_subscription(
    state: &AppState,
    project: &str,
    user_id: &str,
    product_id: &str,
) -> Result<Keyed<Subscription>, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let user_id = validation::user_id(user_id)?;
    let product_id = validation::product_id(product_id)?;
    let now = Utc::now();

    let not_found =
        || ApiError::not_found("SUBSCRIPTION_NOT_FOUND", "No active subscription for this product");

    let Some((key, sub)) = find_active(store, project, user_id, product_id).await? else {
        return Err(not_found());
    };

    let target = if sub.end_date < now {
        SubscriptionStatus::Expired
    } else {
        SubscriptionStatus::Cancelled
    };
    if !transition_if_active(store, project, &key, target, now, state.tx_options()).await? {
        return Err(not_found());
    }
    if target == SubscriptionStatus::Expired {
        return Err(not_found());
    }

    log::info!("subscription cancelled project={project} user_id={user_id} product_id={product_id} key={key}");
    let record = store
        .get(&paths::subscription(project, &key))
        .await?
        .decode::<Subscription>()?
        .ok_or_else(not_found)?;
    Ok(Keyed { id: key, record })
}

pub async fn list_subscriptions(
    state: &AppState,
    project: &str,
    user_id: Option<&str>,
) -> Result<Vec<Keyed<Subscription>>, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let path = paths::subscriptions(project);
    let subs = match user_id {
        Some(user_id) => store::query_collection::<Subscription>(store, &path, "userId", user_id).await?,
        None => store::read_collection::<Subscription>(store, &path).await?,
    };
    Ok(subs
        .into_iter()
        .map(|(id, record)| Keyed { id, record })
        .collect())
}
