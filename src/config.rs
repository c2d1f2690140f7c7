// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::store::TxOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Order in which payment authorization and the purchase commit happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurchaseOrdering {
    /// Authorize, then commit; the authorization is voided when the commit does not happen.
    #[default]
    AuthorizeFirst,
    /// Commit a reservation, then authorize; the reservation is removed on decline.
    ReserveFirst,
}

impl FromStr for PurchaseOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorize_first" => Ok(Self::AuthorizeFirst),
            "reserve_first" => Ok(Self::ReserveFirst),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub gateway_url: Option<String>,
    pub gateway_api_key: String,
    pub simulated_gateway_delay: Duration,
    pub store_deadline: Duration,
    pub store_max_attempts: u32,
    pub purchase_ordering: PurchaseOrdering,
    pub default_country: String,
    pub default_currency: String,
    pub user_history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            gateway_url: None,
            gateway_api_key: String::new(),
            simulated_gateway_delay: Duration::ZERO,
            store_deadline: Duration::from_secs(5),
            store_max_attempts: 25,
            purchase_ordering: PurchaseOrdering::default(),
            default_country: "US".to_string(),
            default_currency: "USD".to_string(),
            user_history_limit: 100,
        }
    }
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: optional("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parsed("PORT", defaults.port)?,
            database_url: optional("DATABASE_URL"),
            gateway_url: optional("PAYMENT_GATEWAY_URL"),
            gateway_api_key: optional("PAYMENT_GATEWAY_API_KEY").unwrap_or_default(),
            simulated_gateway_delay: Duration::from_millis(parsed("SIMULATED_GATEWAY_DELAY_MS", 0u64)?),
            store_deadline: Duration::from_millis(parsed("STORE_DEADLINE_MS", 5000u64)?),
            store_max_attempts: parsed("STORE_MAX_ATTEMPTS", defaults.store_max_attempts)?,
            purchase_ordering: parsed("PURCHASE_ORDERING", defaults.purchase_ordering)?,
            default_country: optional("DEFAULT_COUNTRY").unwrap_or(defaults.default_country),
            default_currency: optional("DEFAULT_CURRENCY").unwrap_or(defaults.default_currency),
            user_history_limit: parsed("USER_HISTORY_LIMIT", defaults.user_history_limit)?,
        })
    }

    pub fn tx_options(&self) -> TxOptions {
        TxOptions {
            max_attempts: self.store_max_attempts.max(1),
            deadline: self.store_deadline,
        }
    }
}
