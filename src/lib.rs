pub mod analytics;
pub mod api;
pub mod catalog;
pub mod config;
pub mod docs;
pub mod error;
pub mod gateway;
pub mod history;
pub mod models;
pub mod projects;
pub mod purchases;
pub mod response;
pub mod store;
pub mod subscriptions;
pub mod validation;

use std::sync::Arc;

use config::Settings;
use gateway::PaymentGateway;
use store::{Store, TxOptions};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, settings: Settings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn tx_options(&self) -> TxOptions {
        self.settings.tx_options()
    }
}
