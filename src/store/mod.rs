// src/store/mod.rs

pub mod memory;
pub mod paths;
pub mod postgres;
pub mod tree;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid store path: {0}")]
    InvalidPath(String),

    #[error("store operation exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("gave up after {attempts} conflicting attempts")]
    Contention { attempts: u32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A node value read together with the version it was read at.
///
/// The version changes whenever the node, one of its ancestors, or anything below it is
/// written. An absent node still has a version, so creation can be guarded too.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub value: Option<Value>,
    pub version: u64,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        match &self.value {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }
}

/// Key-addressable JSON tree with per-node optimistic concurrency.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, path: &str) -> StoreResult<Snapshot>;

    /// Writes `value` (or removes the node for `None`) only if the node is still at
    /// `expected_version`. Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        path: &str,
        expected_version: u64,
        value: Option<Value>,
    ) -> StoreResult<bool>;

    /// Unguarded write. Reserved for uncontended directory records.
    async fn put(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Unguarded removal. Reserved for uncontended directory records.
    async fn remove(&self, path: &str) -> StoreResult<()>;

    /// Children of `path` whose `field` equals `value`, in key order.
    async fn query_eq(&self, path: &str, field: &str, value: &str) -> StoreResult<Vec<(String, Value)>> {
        let snapshot = self.get(path).await?;
        let Some(Value::Object(children)) = snapshot.value else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<(String, Value)> = children
            .into_iter()
            .filter(|(_, child)| child.get(field).and_then(Value::as_str) == Some(value))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matched)
    }

    /// Fresh child key. Keys sort in creation order.
    fn generate_key(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}

/// What a transaction's mutate function wants done with the node it was shown.
#[derive(Debug, Clone)]
pub enum Mutation {
    Set(Value),
    Abort,
}

#[derive(Debug, Clone, Copy)]
pub struct TxOptions {
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            deadline: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub committed: bool,
    /// Committed value, or the value the mutate function last aborted on.
    pub snapshot: Option<Value>,
    pub attempts: u32,
}

/// Optimistic read-modify-write on one node.
///
/// `mutate` sees the latest value on every attempt; when another writer got in between the
/// read and the swap, it is simply invoked again with fresh data. The whole loop runs under
/// `options.deadline`; when the deadline fires the outcome is unknown to the caller.
pub async fn transaction<F>(
    store: &dyn Store,
    path: &str,
    options: TxOptions,
    mut mutate: F,
) -> StoreResult<TxOutcome>
where
    F: FnMut(Option<&Value>) -> StoreResult<Mutation> + Send,
{
    let attempt_loop = async {
        let mut attempts = 0;
        loop {
            if attempts >= options.max_attempts {
                return Err(StoreError::Contention { attempts });
            }
            attempts += 1;

            let current = store.get(path).await?;
            match mutate(current.value.as_ref())? {
                Mutation::Abort => {
                    return Ok(TxOutcome {
                        committed: false,
                        snapshot: current.value,
                        attempts,
                    });
                }
                Mutation::Set(next) => {
                    if store
                        .compare_and_swap(path, current.version, Some(next.clone()))
                        .await?
                    {
                        return Ok(TxOutcome {
                            committed: true,
                            snapshot: Some(next),
                            attempts,
                        });
                    }
                    log::debug!("write conflict on {path}, attempt {attempts}; retrying");
                }
            }
        }
    };

    tokio::time::timeout(options.deadline, attempt_loop)
        .await
        .map_err(|_| StoreError::Timeout(options.deadline))?
}

/// Runs `attempt` until it reports success with `Some`, at most `options.max_attempts`
/// times and within `options.deadline`. `None` means the attempt lost a race.
pub async fn retry_bounded<T, F, Fut>(options: TxOptions, what: &str, mut attempt: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<Option<T>>>,
{
    let attempt_loop = async {
        for n in 1..=options.max_attempts {
            if let Some(done) = attempt().await? {
                return Ok(done);
            }
            log::debug!("write conflict on {what}, attempt {n}; retrying");
        }
        Err(StoreError::Contention {
            attempts: options.max_attempts,
        })
    };

    tokio::time::timeout(options.deadline, attempt_loop)
        .await
        .map_err(|_| StoreError::Timeout(options.deadline))?
}

/// Typed form of [`transaction`]: `mutate` returns `None` to abort.
pub async fn update<T, F>(
    store: &dyn Store,
    path: &str,
    options: TxOptions,
    mut mutate: F,
) -> StoreResult<TxOutcome>
where
    T: DeserializeOwned + Serialize,
    F: FnMut(Option<T>) -> Option<T> + Send,
{
    transaction(store, path, options, |current| {
        let decoded = match current {
            Some(v) => Some(serde_json::from_value::<T>(v.clone())?),
            None => None,
        };
        match mutate(decoded) {
            Some(next) => Ok(Mutation::Set(serde_json::to_value(next)?)),
            None => Ok(Mutation::Abort),
        }
    })
    .await
}

/// Reads and decodes every child of a collection node.
pub async fn read_collection<T: DeserializeOwned>(
    store: &dyn Store,
    path: &str,
) -> StoreResult<Vec<(String, T)>> {
    let snapshot = store.get(path).await?;
    let Some(Value::Object(children)) = snapshot.value else {
        return Ok(Vec::new());
    };
    children
        .into_iter()
        .map(|(key, v)| -> StoreResult<(String, T)> { Ok((key, serde_json::from_value(v)?)) })
        .collect()
}

/// Decodes the result of [`Store::query_eq`].
pub async fn query_collection<T: DeserializeOwned>(
    store: &dyn Store,
    path: &str,
    field: &str,
    value: &str,
) -> StoreResult<Vec<(String, T)>> {
    store
        .query_eq(path, field, value)
        .await?
        .into_iter()
        .map(|(key, v)| -> StoreResult<(String, T)> { Ok((key, serde_json::from_value(v)?)) })
        .collect()
}
