// src/models.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProductType {
    OneTime,
    Subscription,
    Repurchase,
}

impl ProductType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "one-time" => Some(Self::OneTime),
            "subscription" => Some(Self::Subscription),
            "repurchase" => Some(Self::Repurchase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Subscription => "subscription",
            Self::Repurchase => "repurchase",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Length of one billing period. Calendar months and leap years are not modelled.
    pub fn period(&self) -> Duration {
        match self {
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
            Self::Yearly => Duration::days(365),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Paypal,
}

impl PaymentMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "card" => Some(Self::Card),
            "paypal" => Some(Self::Paypal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Paypal => "paypal",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    /// Minor currency units.
    pub price: i64,
    pub status: ProductStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub user_id: String,
    pub product_id: String,
    pub product_type: ProductType,
    pub transaction_id: String,
    pub status: PurchaseStatus,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub country: String,
    pub purchase_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paypal_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn is_completed(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }

    /// A purchase without a payment id is a reservation still waiting on the gateway.
    pub fn is_paid(&self) -> bool {
        self.payment_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user_id: String,
    pub product_id: String,
    pub transaction_id: String,
    pub status: SubscriptionStatus,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub currency: String,
    pub country: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Still marked active although the paid period is over.
    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.end_date < now
    }

    pub fn mark_expired(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Expired;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub product_id: String,
    pub product_type: ProductType,
    pub transaction_id: String,
    pub user_country: String,
    pub date: DateTime<Utc>,
}

/// Denormalized, best-effort projection of a user's purchases.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserHistory {
    pub user_id: String,
    #[serde(default)]
    pub purchase_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub total_purchases: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchases and subscriptions of one project, as held on the project node.
///
/// Everything else stored on the node (products, users, timestamps) rides along in `rest`
/// so a commit never drops data it did not look at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectLedger {
    #[serde(default, deserialize_with = "crate::store::tree::object_or_empty")]
    pub purchases: BTreeMap<String, Purchase>,
    #[serde(default, deserialize_with = "crate::store::tree::object_or_empty")]
    pub subscriptions: BTreeMap<String, Subscription>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl ProjectLedger {
    pub fn completed_purchase(&self, user_id: &str, product_id: &str) -> Option<(&String, &Purchase)> {
        self.purchases
            .iter()
            .find(|(_, p)| p.user_id == user_id && p.product_id == product_id && p.is_completed())
    }

    pub fn active_subscription(&self, user_id: &str, product_id: &str) -> Option<(&String, &Subscription)> {
        self.subscriptions
            .iter()
            .find(|(_, s)| s.user_id == user_id && s.product_id == product_id && s.is_active())
    }

    pub fn purchase_by_transaction(&self, transaction_id: &str) -> Option<(&String, &Purchase)> {
        self.purchases
            .iter()
            .find(|(_, p)| p.transaction_id == transaction_id)
    }
}

/// A stored record together with its store key, flattened as `{ id, ...record }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyed<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

/// `<prefix>_<unix millis>_<9 hex>`, the shape of transaction and payment ids.
pub fn reference_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}
