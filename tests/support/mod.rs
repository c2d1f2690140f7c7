#![allow(dead_code)]

use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use inapp_purchases::config::{PurchaseOrdering, Settings};
use inapp_purchases::gateway::{
    Authorization, GatewayError, PaymentCredentials, PaymentGateway, SimulatedGateway,
};
use inapp_purchases::models::PaymentMethod;
use inapp_purchases::store::{MemoryStore, PgStore, Snapshot, Store, StoreResult};
use inapp_purchases::validation::{CardData, PaypalData};
use inapp_purchases::{catalog, projects, AppState};

pub const CARD_NUMBER: &str = "4111111111111111";
pub const DECLINED_CARD: &str = "4000000000000002";
pub const DECLINED_PAYPAL: &str = "broke@example.com";

/// Simulated gateway that remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct CountingGateway {
    inner: SimulatedGateway,
    authorized: AtomicUsize,
    voided: Mutex<Vec<String>>,
}

impl CountingGateway {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Every authorize and void takes `latency` before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: SimulatedGateway::new(latency)
                .decline_card(DECLINED_CARD)
                .decline_paypal(DECLINED_PAYPAL),
            ..Self::default()
        }
    }

    pub fn authorized(&self) -> usize {
        self.authorized.load(Ordering::SeqCst)
    }

    pub fn voided(&self) -> Vec<String> {
        self.voided.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for CountingGateway {
    async fn authorize(
        &self,
        credentials: &PaymentCredentials,
        amount: i64,
        currency: &str,
    ) -> Result<Authorization, GatewayError> {
        let result = self.inner.authorize(credentials, amount, currency).await?;
        if matches!(result, Authorization::Approved { .. }) {
            self.authorized.fetch_add(1, Ordering::SeqCst);
        }
        Ok(result)
    }

    async fn void(&self, payment_id: &str, method: PaymentMethod) -> Result<(), GatewayError> {
        self.voided.lock().push(payment_id.to_string());
        self.inner.void(payment_id, method).await
    }
}

/// Where a `SlowStore` stalls a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    BeforeWrite,
    AfterWrite,
}

/// Memory store whose guarded writes to one path hang for `delay` once armed.
pub struct SlowStore {
    pub inner: MemoryStore,
    path: String,
    stall: Stall,
    delay: Duration,
    armed: AtomicBool,
}

impl SlowStore {
    pub fn new(path: impl Into<String>, stall: Stall, delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            path: path.into(),
            stall,
            delay,
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for SlowStore {
    async fn get(&self, path: &str) -> StoreResult<Snapshot> {
        self.inner.get(path).await
    }

    async fn compare_and_swap(&self, path: &str, expected_version: u64, value: Option<Value>) -> StoreResult<bool> {
        if path != self.path || !self.armed.load(Ordering::SeqCst) {
            return self.inner.compare_and_swap(path, expected_version, value).await;
        }
        if self.stall == Stall::BeforeWrite {
            tokio::time::sleep(self.delay).await;
        }
        let swapped = self.inner.compare_and_swap(path, expected_version, value).await?;
        if self.stall == Stall::AfterWrite {
            tokio::time::sleep(self.delay).await;
        }
        Ok(swapped)
    }

    async fn put(&self, path: &str, value: Value) -> StoreResult<()> {
        self.inner.put(path, value).await
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.inner.remove(path).await
    }
}

/// Memory store on which every guarded write to one path loses, once armed.
pub struct ContendedStore {
    pub inner: MemoryStore,
    path: String,
    armed: AtomicBool,
}

impl ContendedStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            inner: MemoryStore::new(),
            path: path.into(),
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for ContendedStore {
    async fn get(&self, path: &str) -> StoreResult<Snapshot> {
        self.inner.get(path).await
    }

    async fn compare_and_swap(&self, path: &str, expected_version: u64, value: Option<Value>) -> StoreResult<bool> {
        if path == self.path && self.armed.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.compare_and_swap(path, expected_version, value).await
    }

    async fn put(&self, path: &str, value: Value) -> StoreResult<()> {
        self.inner.put(path, value).await
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.inner.remove(path).await
    }
}

pub struct TestEnv {
    pub state: AppState,
    pub store: Arc<dyn Store>,
    pub gateway: Arc<CountingGateway>,
}

pub fn settings(ordering: PurchaseOrdering) -> Settings {
    Settings {
        purchase_ordering: ordering,
        ..Settings::default()
    }
}

pub fn env_with(store: Arc<dyn Store>, settings: Settings) -> TestEnv {
    env_with_gateway(store, settings, CountingGateway::new())
}

pub fn env_with_gateway(store: Arc<dyn Store>, settings: Settings, gateway: CountingGateway) -> TestEnv {
    let gateway = Arc::new(gateway);
    let state = AppState::new(store.clone(), gateway.clone(), settings);
    TestEnv { state, store, gateway }
}

pub fn memory_env(ordering: PurchaseOrdering) -> TestEnv {
    env_with(Arc::new(MemoryStore::new()), settings(ordering))
}

pub async fn seed_project(state: &AppState, name: &str) {
    projects::initialize_project(state, name)
        .await
        .expect("initialize project");
}

/// Adds an active product; subscriptions bill monthly.
pub async fn seed_product(state: &AppState, project: &str, name: &str, product_type: &str, price: i64) {
    catalog::add_product(
        state,
        project,
        catalog::NewProduct {
            name: name.to_string(),
            product_type: product_type.to_string(),
            price: json!(price),
            description: None,
            frequency: (product_type == "subscription").then(|| "monthly".to_string()),
            recurring: None,
            status: Some("active".to_string()),
        },
    )
    .await
    .expect("add product");
}

pub fn card() -> CardData {
    card_numbered(CARD_NUMBER)
}

pub fn card_numbered(number: &str) -> CardData {
    CardData {
        card_number: Some(number.to_string()),
        expiry: Some("12/99".to_string()),
        cvv: Some("123".to_string()),
        name: Some("Test Holder".to_string()),
        card_type: Some("visa".to_string()),
    }
}

pub fn paypal(email: &str) -> PaypalData {
    PaypalData {
        email: Some(email.to_string()),
    }
}

static TEST_DB_LOCK: OnceLock<AsyncMutex<()>> = OnceLock::new();

pub struct TestDb {
    pub store: Arc<PgStore>,
    _guard: MutexGuard<'static, ()>,
}

/// Postgres store on `TEST_DATABASE_URL`, or `None` when the variable is not set.
/// Tests serialize on a process-wide lock and use unique project names.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let url = env::var("TEST_DATABASE_URL").ok()?;

    let lock = TEST_DB_LOCK.get_or_init(|| AsyncMutex::new(()));
    let guard = lock.lock().await;

    let store = PgStore::connect(&url).await.expect("connect test db");
    store.migrate().await.expect("migrations");
    Some(TestDb {
        store: Arc::new(store),
        _guard: guard,
    })
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
