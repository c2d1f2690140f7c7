// src/gateway/http.rs
//
// Client for a JSON payment processor API.
// Auth: X-Api-Key header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Authorization, GatewayError, PaymentCredentials, PaymentGateway};
use crate::models::PaymentMethod;

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    amount: i64,
    currency: &'a str,
    #[serde(flatten)]
    credentials: &'a PaymentCredentials,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    status: String,

    #[serde(rename = "paymentId")]
    payment_id: Option<String>,

    #[serde(default)]
    code: Option<String>,

    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct VoidRequest<'a> {
    method: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

fn interpret(resp: AuthorizeResponse) -> Result<Authorization, GatewayError> {
    match resp.status.as_str() {
        "approved" => match resp.payment_id {
            Some(payment_id) => Ok(Authorization::Approved { payment_id }),
            None => Err(GatewayError::InvalidResponse(
                "approved without paymentId".to_string(),
            )),
        },
        "declined" => Ok(Authorization::Declined {
            code: resp.code.unwrap_or_else(|| "PAYMENT_DECLINED".to_string()),
            reason: resp.reason.unwrap_or_else(|| "Payment declined".to_string()),
        }),
        other => Err(GatewayError::InvalidResponse(format!(
            "unknown authorization status {other}"
        ))),
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn authorize(
        &self,
        credentials: &PaymentCredentials,
        amount: i64,
        currency: &str,
    ) -> Result<Authorization, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/v1/authorizations", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&AuthorizeRequest {
                amount,
                currency,
                credentials,
            })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        // 402 carries a regular decline body.
        if !status.is_success() && status.as_u16() != 402 {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = serde_json::from_str::<AuthorizeResponse>(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{e}; body={body}")))?;
        interpret(parsed)
    }

    async fn void(&self, payment_id: &str, method: PaymentMethod) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(format!("{}/v1/authorizations/{payment_id}/void", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&VoidRequest {
                method: method.as_str(),
            })
            .send()
            .await?;

        if resp.status().as_u16() == 204 {
            return Ok(());
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
