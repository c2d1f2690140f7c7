// src/gateway/simulated.rs

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use super::{Authorization, GatewayError, PaymentCredentials, PaymentGateway};
use crate::models::{reference_id, PaymentMethod};

/// Stand-in processor: approves everything except explicitly blocked cards and PayPal
/// accounts, after an optional artificial latency.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    latency: Duration,
    declined_cards: HashSet<String>,
    declined_paypal: HashSet<String>,
}

impl SimulatedGateway {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn decline_card(mut self, card_number: impl Into<String>) -> Self {
        self.declined_cards.insert(card_number.into());
        self
    }

    pub fn decline_paypal(mut self, email: impl Into<String>) -> Self {
        self.declined_paypal.insert(email.into().to_lowercase());
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

pub fn payment_id(method: PaymentMethod) -> String {
    let prefix = match method {
        PaymentMethod::Card => "pay",
        PaymentMethod::Paypal => "pp",
    };
    reference_id(prefix)
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(
        &self,
        credentials: &PaymentCredentials,
        amount: i64,
        currency: &str,
    ) -> Result<Authorization, GatewayError> {
        self.simulate_latency().await;

        let declined = match credentials {
            PaymentCredentials::Card(card) if self.declined_cards.contains(&card.card_number) => {
                Some(("CARD_DECLINED", "Card was declined by the issuer"))
            }
            PaymentCredentials::Paypal(pp) if self.declined_paypal.contains(&pp.email.to_lowercase()) => {
                Some(("PAYPAL_DECLINED", "PayPal account declined the payment"))
            }
            _ => None,
        };

        if let Some((code, reason)) = declined {
            log::info!(
                "simulated gateway declined method={} amount={amount} {currency}",
                credentials.method()
            );
            return Ok(Authorization::Declined {
                code: code.to_string(),
                reason: reason.to_string(),
            });
        }

        Ok(Authorization::Approved {
            payment_id: payment_id(credentials.method()),
        })
    }

    async fn void(&self, payment_id: &str, method: PaymentMethod) -> Result<(), GatewayError> {
        self.simulate_latency().await;
        log::info!("simulated gateway voided payment_id={payment_id} method={method}");
        Ok(())
    }
}
