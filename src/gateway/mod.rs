// src/gateway/mod.rs
//
// Payment gateway seam: authorize a charge, void it again when a later step fails.

pub mod http;
pub mod simulated;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::PaymentMethod;

pub use http::HttpGateway;
pub use simulated::SimulatedGateway;

#[derive(Debug)]
pub enum GatewayError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Http(e) => write!(f, "http error: {e}"),
            GatewayError::Api { status, body } => {
                write!(f, "gateway api error status={status} body={body}")
            }
            GatewayError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Card details that passed structural validation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCredentials {
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
}

impl CardCredentials {
    pub fn last_four(&self) -> String {
        mask_card_number(&self.card_number)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaypalCredentials {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentCredentials {
    Card(CardCredentials),
    Paypal(PaypalCredentials),
}

impl PaymentCredentials {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Card(_) => PaymentMethod::Card,
            Self::Paypal(_) => PaymentMethod::Paypal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Approved { payment_id: String },
    Declined { code: String, reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        credentials: &PaymentCredentials,
        amount: i64,
        currency: &str,
    ) -> Result<Authorization, GatewayError>;

    /// Releases a previous authorization. Callers treat this as best effort.
    async fn void(&self, payment_id: &str, method: PaymentMethod) -> Result<(), GatewayError>;
}

/// Last four digits, or `****` when there are fewer than four.
pub fn mask_card_number(card_number: &str) -> String {
    let chars: Vec<char> = card_number.chars().collect();
    if chars.len() < 4 {
        return "****".to_string();
    }
    chars[chars.len() - 4..].iter().collect()
}
