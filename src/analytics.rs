// src/analytics.rs
//
// Revenue reporting. `aggregate` is a pure reduction over already loaded records so the same
// input always yields the same report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{Keyed, Product, Purchase, Subscription};
use crate::projects::require_project;
use crate::store::{self, paths};
use crate::{validation, AppState};

const UNKNOWN: &str = "Unknown";

/// Inclusive purchase-date bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ApiError> {
        let bound = |field: &str, raw: Option<&str>| -> Result<Option<DateTime<Utc>>, ApiError> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => validation::date_bound(field, raw).map(Some),
                None => Ok(None),
            }
        };
        Ok(Self {
            start: bound("startDate", start)?,
            end: bound("endDate", end)?,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_products: usize,
    pub active_products: usize,
    pub total_purchases: usize,
    pub total_revenue: i64,
    pub active_subscriptions: usize,
    pub average_order_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub revenue_by_country: BTreeMap<String, i64>,
    pub revenue_by_payment_method: BTreeMap<String, i64>,
    pub product_revenue: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub filtered_purchases: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub overview: Overview,
    pub breakdown: Breakdown,
    pub date_range: DateRange,
}

fn key_or_unknown(raw: &str) -> String {
    if raw.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        raw.to_string()
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn aggregate(
    purchases: &[Purchase],
    subscriptions: &[Subscription],
    products: &[Product],
    window: &DateWindow,
) -> AnalyticsReport {
    let completed: Vec<&Purchase> = purchases
        .iter()
        .filter(|p| window.contains(p.purchase_date))
        .filter(|p| p.is_completed())
        .collect();

    let mut breakdown = Breakdown::default();
    let mut total_revenue = 0i64;
    for purchase in &completed {
        let amount = purchase.amount;
        total_revenue += amount;
        *breakdown
            .revenue_by_country
            .entry(key_or_unknown(&purchase.country))
            .or_default() += amount;
        *breakdown
            .revenue_by_payment_method
            .entry(purchase.payment_method.to_string())
            .or_default() += amount;
        *breakdown
            .product_revenue
            .entry(key_or_unknown(&purchase.product_id))
            .or_default() += amount;
    }

    let total_purchases = completed.len();
    let average_order_value = if total_purchases == 0 {
        0.0
    } else {
        round_cents(total_revenue as f64 / total_purchases as f64)
    };

    AnalyticsReport {
        overview: Overview {
            total_products: products.len(),
            active_products: products.iter().filter(|p| p.is_active()).count(),
            total_purchases,
            total_revenue,
            active_subscriptions: subscriptions.iter().filter(|s| s.is_active()).count(),
            average_order_value,
        },
        breakdown,
        date_range: DateRange {
            start_date: window.start,
            end_date: window.end,
            filtered_purchases: total_purchases,
        },
    }
}

fn records<T>(keyed: Vec<(String, T)>) -> Vec<T> {
    keyed.into_iter().map(|(_, record)| record).collect()
}

pub async fn project_analytics(
    state: &AppState,
    project: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<AnalyticsReport, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let window = DateWindow::parse(start_date, end_date)?;

    let purchases_path = paths::purchases(project);
    let subscriptions_path = paths::subscriptions(project);
    let products_path = paths::products(project);
    let (purchases, subscriptions, products) = futures_util::try_join!(
        store::read_collection::<Purchase>(store, &purchases_path),
        store::read_collection::<Subscription>(store, &subscriptions_path),
        store::read_collection::<Product>(store, &products_path),
    )?;

    Ok(aggregate(
        &records(purchases),
        &records(subscriptions),
        &records(products),
        &window,
    ))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub purchases: Vec<Keyed<Purchase>>,
    pub subscriptions: Vec<Keyed<Subscription>>,
    pub total_purchases: usize,
    pub active_subscriptions: usize,
}

/// Completed purchases and live subscriptions of one user. Lapsed subscriptions that no
/// reader has expired yet are left out but not written.
pub async fn user_summary(state: &AppState, project: &str, user_id: &str) -> Result<UserSummary, ApiError> {
    let store = state.store.as_ref();
    require_project(store, project).await?;
    let user_id = validation::user_id(user_id)?;

    let purchases_path = paths::purchases(project);
    let subscriptions_path = paths::subscriptions(project);
    let (purchases, subscriptions) = futures_util::try_join!(
        store::query_collection::<Purchase>(store, &purchases_path, "userId", user_id),
        store::query_collection::<Subscription>(store, &subscriptions_path, "userId", user_id),
    )?;

    let now = Utc::now();
    let purchases: Vec<Keyed<Purchase>> = purchases
        .into_iter()
        .filter(|(_, p)| p.is_completed())
        .map(|(id, record)| Keyed { id, record })
        .collect();
    let subscriptions: Vec<Keyed<Subscription>> = subscriptions
        .into_iter()
        .filter(|(_, s)| s.is_active() && !s.has_lapsed(now))
        .map(|(id, record)| Keyed { id, record })
        .collect();

    Ok(UserSummary {
        total_purchases: purchases.len(),
        active_subscriptions: subscriptions.len(),
        purchases,
        subscriptions,
    })
}
