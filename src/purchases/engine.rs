// src/purchases/engine.rs
//
// Purchase commit engine.
//
// Every commit is one optimistic transaction on the project node, so the conflict scan for
// (user, product) always runs against the latest committed purchases and subscriptions. The
// price of that guarantee is that all purchases of a project contend on a single node.

use chrono::{DateTime, Utc};

use super::PurchaseReceipt;
use crate::catalog::require_product;
use crate::config::PurchaseOrdering;
use crate::error::ApiError;
use crate::gateway::{Authorization, PaymentCredentials};
use crate::history;
use crate::models::{
    reference_id, Frequency, HistoryEntry, PaymentMethod, Product, ProductType, ProjectLedger, Purchase, PurchaseStatus,
    Subscription, SubscriptionStatus,
};
use crate::projects::require_project;
use crate::store::{self, paths, StoreError, StoreResult};
use crate::validation::{self, CardData, PaypalData};
use crate::AppState;

#[derive(Debug, Clone, Default)]
pub struct PurchaseIntent {
    pub project: String,
    pub user_id: String,
    pub product_id: String,
    pub payment_method: String,
    pub card_data: Option<CardData>,
    pub paypal_data: Option<PaypalData>,
    pub country: Option<String>,
    /// Caller-chosen idempotency key. Generated when absent.
    pub transaction_id: Option<String>,
}

/// Everything needed to write the records, fixed before the first side effect.
struct Checkout {
    project: String,
    user_id: String,
    product: Product,
    credentials: PaymentCredentials,
    country: String,
    currency: String,
    transaction_id: String,
}

impl Checkout {
    fn method(&self) -> PaymentMethod {
        self.credentials.method()
    }

    fn purchase(&self, payment_id: Option<String>, now: DateTime<Utc>) -> Purchase {
        let (card_last_four, card_type, paypal_email) = match &self.credentials {
            PaymentCredentials::Card(card) => (
                Some(card.last_four()),
                Some(card.card_type.clone().unwrap_or_else(|| "unknown".to_string())),
                None,
            ),
            PaymentCredentials::Paypal(pp) => (None, None, Some(pp.email.clone())),
        };

        Purchase {
            user_id: self.user_id.clone(),
            product_id: self.product.product_id.clone(),
            product_type: self.product.product_type,
            transaction_id: self.transaction_id.clone(),
            status: PurchaseStatus::Completed,
            payment_method: self.method(),
            payment_id,
            amount: self.product.price,
            currency: self.currency.clone(),
            country: self.country.clone(),
            purchase_date: now,
            card_last_four,
            card_type,
            paypal_email,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription(&self, now: DateTime<Utc>) -> Option<Subscription> {
        if self.product.product_type != ProductType::Subscription {
            return None;
        }
        let frequency = self.product.frequency.unwrap_or(Frequency::Monthly);
        Some(Subscription {
            user_id: self.user_id.clone(),
            product_id: self.product.product_id.clone(),
            transaction_id: self.transaction_id.clone(),
            status: SubscriptionStatus::Active,
            payment_method: self.method(),
            amount: self.product.price,
            currency: self.currency.clone(),
            country: self.country.clone(),
            start_date: now,
            end_date: now + frequency.period(),
            frequency,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn history_entry(&self, now: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            product_id: self.product.product_id.clone(),
            product_type: self.product.product_type,
            transaction_id: self.transaction_id.clone(),
            user_country: self.country.clone(),
            date: now,
        }
    }

    fn conflict(&self) -> ApiError {
        match self.product.product_type {
            ProductType::Subscription => {
                ApiError::conflict("ALREADY_SUBSCRIBED", "User already has active subscription")
            }
            _ => ApiError::conflict("ALREADY_PURCHASED", "Product already purchased"),
        }
    }
}

#[derive(Debug, Clone)]
struct Committed {
    purchase_key: String,
    purchase: Purchase,
    subscription_key: Option<String>,
    subscription: Option<Subscription>,
}

#[derive(Debug, Clone)]
enum Rejection {
    AlreadyOwned,
    Replayed { purchase_key: String, purchase: Purchase },
    ProjectMissing,
}

#[derive(Debug)]
enum CommitResult {
    Committed(Committed),
    Rejected(Rejection),
}

fn generate_transaction_id() -> String {
    reference_id("txn")
}

/// Validates the intent and pins down the checkout. No side effects.
async fn prepare(state: &AppState, intent: &PurchaseIntent) -> Result<Checkout, ApiError> {
    let store = state.store.as_ref();
    require_project(store, &intent.project).await?;
    let user_id = validation::user_id(&intent.user_id)?;
    let product = require_product(store, &intent.project, &intent.product_id).await?;
    if !product.is_active() {
        return Err(ApiError::validation(
            "PRODUCT_INACTIVE",
            "Product is not available for purchase",
        ));
    }

    let method = validation::payment_method(&intent.payment_method)?;
    let credentials = validation::credentials(
        method,
        intent.card_data.as_ref(),
        intent.paypal_data.as_ref(),
        Utc::now(),
    )?;

    let transaction_id = match intent.transaction_id.as_deref().map(str::trim) {
        Some("") => {
            return Err(ApiError::validation(
                "INVALID_TRANSACTION_ID",
                "transactionId must not be empty",
            ))
        }
        Some(id) => id.to_string(),
        None => generate_transaction_id(),
    };

    let country = intent
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| state.settings.default_country.clone());

    Ok(Checkout {
        project: intent.project.clone(),
        user_id: user_id.to_string(),
        product,
        credentials,
        country,
        currency: state.settings.default_currency.clone(),
        transaction_id,
    })
}

/// Looks up an already committed purchase for this transaction id.
async fn find_by_transaction(
    state: &AppState,
    checkout: &Checkout,
) -> StoreResult<Option<(String, Purchase)>> {
    let found = store::query_collection::<Purchase>(
        state.store.as_ref(),
        &paths::purchases(&checkout.project),
        "transactionId",
        &checkout.transaction_id,
    )
    .await?;
    Ok(found.into_iter().next())
}

async fn find_subscription_by_transaction(
    state: &AppState,
    checkout: &Checkout,
) -> StoreResult<Option<(String, Subscription)>> {
    let found = store::query_collection::<Subscription>(
        state.store.as_ref(),
        &paths::subscriptions(&checkout.project),
        "transactionId",
        &checkout.transaction_id,
    )
    .await?;
    Ok(found.into_iter().next())
}

fn replay_receipt(checkout: &Checkout, purchase_key: String, purchase: Purchase) -> Result<PurchaseReceipt, ApiError> {
    if purchase.user_id != checkout.user_id || purchase.product_id != checkout.product.product_id {
        return Err(ApiError::validation(
            "TRANSACTION_ID_IN_USE",
            "transactionId already belongs to another purchase",
        ));
    }
    // An unpaid record is a reservation whose authorization is still running and may yet
    // be rolled back.
    if !purchase.is_paid() {
        return Err(ApiError::purchase_in_progress());
    }
    Ok(PurchaseReceipt::replayed(purchase_key, purchase))
}

/// The conflict scan and append, as one transaction on the project node.
async fn commit(state: &AppState, checkout: &Checkout, payment_id: Option<String>) -> StoreResult<CommitResult> {
    let store = state.store.as_ref();
    let mut rejection: Option<Rejection> = None;
    let mut committed: Option<Committed> = None;

    let outcome = store::update::<ProjectLedger, _>(
        store,
        &paths::project(&checkout.project),
        state.tx_options(),
        |current| {
            rejection = None;
            committed = None;

            let Some(mut ledger) = current else {
                rejection = Some(Rejection::ProjectMissing);
                return None;
            };

            if let Some((key, purchase)) = ledger.purchase_by_transaction(&checkout.transaction_id) {
                rejection = Some(Rejection::Replayed {
                    purchase_key: key.clone(),
                    purchase: purchase.clone(),
                });
                return None;
            }

            let now = Utc::now();
            let user_id = checkout.user_id.as_str();
            let product_id = checkout.product.product_id.as_str();
            match checkout.product.product_type {
                ProductType::OneTime => {
                    if ledger.completed_purchase(user_id, product_id).is_some() {
                        rejection = Some(Rejection::AlreadyOwned);
                        return None;
                    }
                }
                ProductType::Subscription => {
                    // A lapsed entitlement does not block renewal; it is expired in this commit.
                    for sub in ledger.subscriptions.values_mut() {
                        if sub.user_id == user_id && sub.product_id == product_id && sub.has_lapsed(now) {
                            sub.mark_expired(now);
                        }
                    }
                    if ledger.active_subscription(user_id, product_id).is_some() {
                        rejection = Some(Rejection::AlreadyOwned);
                        return None;
                    }
                }
                ProductType::Repurchase => {}
            }

            let purchase = checkout.purchase(payment_id.clone(), now);
            let purchase_key = store.generate_key();
            ledger.purchases.insert(purchase_key.clone(), purchase.clone());

            let subscription = checkout.subscription(now);
            let subscription_key = subscription.as_ref().map(|sub| {
                let key = store.generate_key();
                ledger.subscriptions.insert(key.clone(), sub.clone());
                key
            });

            committed = Some(Committed {
                purchase_key,
                purchase,
                subscription_key,
                subscription,
            });
            Some(ledger)
        },
    )
    .await?;

    if outcome.committed {
        if let Some(done) = committed {
            return Ok(CommitResult::Committed(done));
        }
    }
    Ok(CommitResult::Rejected(
        rejection.unwrap_or(Rejection::ProjectMissing),
    ))
}

/// Best-effort release of an authorization. Never fails the caller.
async fn compensate(state: &AppState, checkout: &Checkout, payment_id: &str, why: &str) {
    log::warn!(
        "voiding payment payment_id={payment_id} project={} user_id={} product_id={} transaction_id={} reason={why}",
        checkout.project,
        checkout.user_id,
        checkout.product.product_id,
        checkout.transaction_id
    );
    if let Err(e) = state.gateway.void(payment_id, checkout.method()).await {
        log::error!(
            "void failed payment_id={payment_id} transaction_id={}: {e}",
            checkout.transaction_id
        );
    }
}

fn record_history(state: &AppState, checkout: &Checkout, purchase: &Purchase) {
    history::spawn_append(
        state.store.clone(),
        checkout.project.clone(),
        checkout.user_id.clone(),
        checkout.history_entry(purchase.purchase_date),
        state.settings.user_history_limit,
        state.tx_options(),
    );
}

fn declined(code: String, reason: String) -> ApiError {
    ApiError::Payment {
        code,
        message: "Payment declined".to_string(),
        reason,
    }
}

/// Validates, authorizes and commits one purchase.
pub async fn submit_purchase(state: &AppState, intent: PurchaseIntent) -> Result<PurchaseReceipt, ApiError> {
    let checkout = prepare(state, &intent).await?;

    if intent.transaction_id.is_some() {
        if let Some((key, purchase)) = find_by_transaction(state, &checkout).await? {
            log::info!(
                "transaction id already recorded transaction_id={} paid={}",
                checkout.transaction_id,
                purchase.is_paid()
            );
            return replay_receipt(&checkout, key, purchase);
        }
    }

    match state.settings.purchase_ordering {
        PurchaseOrdering::AuthorizeFirst => authorize_then_commit(state, &checkout).await,
        PurchaseOrdering::ReserveFirst => reserve_then_authorize(state, &checkout).await,
    }
}

async fn authorize(state: &AppState, checkout: &Checkout) -> Result<String, ApiError> {
    let authorization = state
        .gateway
        .authorize(&checkout.credentials, checkout.product.price, &checkout.currency)
        .await?;
    match authorization {
        Authorization::Approved { payment_id } => Ok(payment_id),
        Authorization::Declined { code, reason } => {
            log::info!(
                "payment declined project={} user_id={} product_id={} code={code}",
                checkout.project,
                checkout.user_id,
                checkout.product.product_id
            );
            Err(declined(code, reason))
        }
    }
}

async fn authorize_then_commit(state: &AppState, checkout: &Checkout) -> Result<PurchaseReceipt, ApiError> {
    let payment_id = authorize(state, checkout).await?;

    match commit(state, checkout, Some(payment_id.clone())).await {
        Ok(CommitResult::Committed(done)) => {
            log::info!(
                "purchase committed project={} user_id={} product_id={} transaction_id={} payment_id={payment_id}",
                checkout.project,
                checkout.user_id,
                checkout.product.product_id,
                checkout.transaction_id
            );
            record_history(state, checkout, &done.purchase);
            Ok(PurchaseReceipt::committed(done.purchase_key, done.purchase, done.subscription_key, done.subscription))
        }
        Ok(CommitResult::Rejected(rejection)) => {
            compensate(state, checkout, &payment_id, "commit rejected").await;
            match rejection {
                Rejection::AlreadyOwned => Err(checkout.conflict()),
                Rejection::Replayed { purchase_key, purchase } => replay_receipt(checkout, purchase_key, purchase),
                Rejection::ProjectMissing => Err(ApiError::project_not_found()),
            }
        }
        Err(StoreError::Timeout(deadline)) => {
            // The commit may or may not have landed; look before compensating.
            match find_by_transaction(state, checkout).await {
                Ok(Some((key, purchase))) => {
                    log::warn!(
                        "commit outcome confirmed after deadline transaction_id={}",
                        checkout.transaction_id
                    );
                    let subscription = match find_subscription_by_transaction(state, checkout).await {
                        Ok(found) => found,
                        Err(e) => {
                            log::error!(
                                "subscription lookup failed after deadline transaction_id={}: {e}",
                                checkout.transaction_id
                            );
                            None
                        }
                    };
                    record_history(state, checkout, &purchase);
                    let (subscription_key, subscription) = subscription.unzip();
                    Ok(PurchaseReceipt::committed(key, purchase, subscription_key, subscription))
                }
                Ok(None) => {
                    compensate(state, checkout, &payment_id, "commit timed out").await;
                    Err(StoreError::Timeout(deadline).into())
                }
                Err(probe) => {
                    log::error!(
                        "commit outcome unknown transaction_id={} payment_id={payment_id}: {probe}",
                        checkout.transaction_id
                    );
                    Err(StoreError::Timeout(deadline).into())
                }
            }
        }
        Err(e) => {
            compensate(state, checkout, &payment_id, "store failure").await;
            Err(e.into())
        }
    }
}

/// Removes the records of a reservation whose payment did not go through. Paid records and
/// their subscriptions are never touched.
async fn rollback(state: &AppState, checkout: &Checkout) -> StoreResult<bool> {
    let transaction_id = checkout.transaction_id.as_str();
    let outcome = store::update::<ProjectLedger, _>(
        state.store.as_ref(),
        &paths::project(&checkout.project),
        state.tx_options(),
        |current| {
            let mut ledger = current?;
            let paid = ledger
                .purchases
                .values()
                .any(|p| p.transaction_id == transaction_id && p.is_paid());
            if paid {
                return None;
            }
            let before = ledger.purchases.len() + ledger.subscriptions.len();
            ledger.purchases.retain(|_, p| p.transaction_id != transaction_id);
            ledger.subscriptions.retain(|_, s| s.transaction_id != transaction_id);
            let removed = ledger.purchases.len() + ledger.subscriptions.len() < before;
            removed.then_some(ledger)
        },
    )
    .await?;
    Ok(outcome.committed)
}

async fn rollback_logged(state: &AppState, checkout: &Checkout) {
    match rollback(state, checkout).await {
        Ok(removed) => log::info!(
            "reservation rolled back transaction_id={} removed={removed}",
            checkout.transaction_id
        ),
        Err(e) => log::error!(
            "reservation rollback failed, unpaid record left behind transaction_id={}: {e}",
            checkout.transaction_id
        ),
    }
}

async fn attach_payment_id(state: &AppState, checkout: &Checkout, purchase_key: &str, payment_id: &str) -> StoreResult<()> {
    store::update::<ProjectLedger, _>(
        state.store.as_ref(),
        &paths::project(&checkout.project),
        state.tx_options(),
        |current| {
            let mut ledger = current?;
            let purchase = ledger.purchases.get_mut(purchase_key)?;
            purchase.payment_id = Some(payment_id.to_string());
            purchase.updated_at = Utc::now();
            Some(ledger)
        },
    )
    .await?;
    Ok(())
}

async fn reserve_then_authorize(state: &AppState, checkout: &Checkout) -> Result<PurchaseReceipt, ApiError> {
    let mut done = match commit(state, checkout, None).await {
        Ok(CommitResult::Committed(done)) => done,
        Ok(CommitResult::Rejected(Rejection::AlreadyOwned)) => return Err(checkout.conflict()),
        Ok(CommitResult::Rejected(Rejection::Replayed { purchase_key, purchase })) => {
            return replay_receipt(checkout, purchase_key, purchase)
        }
        Ok(CommitResult::Rejected(Rejection::ProjectMissing)) => return Err(ApiError::project_not_found()),
        Err(StoreError::Timeout(deadline)) => {
            // A reservation may have landed without payment; take it back if so.
            rollback_logged(state, checkout).await;
            return Err(StoreError::Timeout(deadline).into());
        }
        Err(e) => return Err(e.into()),
    };

    let payment_id = match authorize(state, checkout).await {
        Ok(payment_id) => payment_id,
        Err(e) => {
            rollback_logged(state, checkout).await;
            return Err(e);
        }
    };

    if let Err(e) = attach_payment_id(state, checkout, &done.purchase_key, &payment_id).await {
        log::error!(
            "paid purchase is missing its payment id transaction_id={} payment_id={payment_id}: {e}",
            checkout.transaction_id
        );
    }
    done.purchase.payment_id = Some(payment_id);

    log::info!(
        "purchase committed project={} user_id={} product_id={} transaction_id={}",
        checkout.project,
        checkout.user_id,
        checkout.product.product_id,
        checkout.transaction_id
    );
    record_history(state, checkout, &done.purchase);
    Ok(PurchaseReceipt::committed(done.purchase_key, done.purchase, done.subscription_key, done.subscription))
}
