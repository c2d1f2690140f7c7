// src/store/postgres.rs

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use super::{retry_bounded, tree, Snapshot, Store, StoreError, StoreResult, TxOptions};

/// Segments that address one stored document. `projects/{name}` is one row, so every
/// project is its own contention domain and a project's sub-nodes share its version.
const PARTITION_DEPTH: usize = 2;

/// Postgres-backed store: one JSONB document per partition, versioned as a whole.
///
/// Versioning at document granularity is coarser than the tree semantics require; it can
/// only report extra conflicts, never miss one.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    /// Bounds for unguarded writes, which retry internally when the row moves under them.
    options: TxOptions,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            options: TxOptions::default(),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load(&self, key: &str) -> StoreResult<Option<(Value, u64)>> {
        let row = sqlx::query(
            r#"SELECT document, version
               FROM store_documents
               WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let document: Value = r.get("document");
            let version: i64 = r.get("version");
            (document, version as u64)
        }))
    }

    async fn store(&self, key: &str, document: Value, expected: Option<u64>) -> StoreResult<bool> {
        let result = match expected {
            None => {
                sqlx::query(
                    r#"INSERT INTO store_documents (key, document, version)
                       VALUES ($1, $2, 1)
                       ON CONFLICT (key) DO NOTHING"#,
                )
                .bind(key)
                .bind(document)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"UPDATE store_documents
                       SET document = $2, version = version + 1, updated_at = NOW()
                       WHERE key = $1 AND version = $3"#,
                )
                .bind(key)
                .bind(document)
                .bind(version as i64)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    /// Applies a write inside the partition document, retrying only on lost races for the
    /// row itself.
    async fn write_unguarded(&self, path: &str, value: Option<Value>) -> StoreResult<()> {
        let (key, inner) = split(path)?;
        let (key, inner, value) = (&key, &inner, &value);
        retry_bounded(self.options, path, || async move {
            let current = self.load(key).await?;
            let expected = current.as_ref().map(|(_, v)| *v);
            let mut document = current.map(|(d, _)| d).unwrap_or(Value::Null);
            tree::write(&mut document, inner, value.clone());
            Ok(self.store(key, document, expected).await?.then_some(()))
        })
        .await
    }
}

fn split(path: &str) -> StoreResult<(String, Vec<&str>)> {
    let segs = tree::segments(path);
    if segs.len() < PARTITION_DEPTH {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let (partition, inner) = segs.split_at(PARTITION_DEPTH);
    Ok((partition.join("/"), inner.to_vec()))
}

#[async_trait]
impl Store for PgStore {
    async fn get(&self, path: &str) -> StoreResult<Snapshot> {
        let (key, inner) = split(path)?;
        Ok(match self.load(&key).await? {
            Some((document, version)) => Snapshot {
                value: tree::get(&document, &inner).cloned(),
                version,
            },
            None => Snapshot {
                value: None,
                version: 0,
            },
        })
    }

    async fn compare_and_swap(
        &self,
        path: &str,
        expected_version: u64,
        value: Option<Value>,
    ) -> StoreResult<bool> {
        let (key, inner) = split(path)?;
        let current = self.load(&key).await?;
        let actual = current.as_ref().map(|(_, v)| *v).unwrap_or(0);
        if actual != expected_version {
            return Ok(false);
        }

        let expected = current.as_ref().map(|(_, v)| *v);
        let mut document = current.map(|(d, _)| d).unwrap_or(Value::Null);
        tree::write(&mut document, &inner, value);
        self.store(&key, document, expected).await
    }

    async fn put(&self, path: &str, value: Value) -> StoreResult<()> {
        self.write_unguarded(path, Some(value)).await
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.write_unguarded(path, None).await
    }

    async fn query_eq(&self, path: &str, field: &str, value: &str) -> StoreResult<Vec<(String, Value)>> {
        let (key, inner) = split(path)?;
        let rows = sqlx::query(
            r#"SELECT child.key AS child_key, child.value AS child_value
               FROM store_documents d,
                    jsonb_each(CASE WHEN jsonb_typeof(d.document #> $2) = 'object'
                                    THEN d.document #> $2
                                    ELSE '{}'::jsonb END) AS child
               WHERE d.key = $1 AND child.value ->> $3 = $4
               ORDER BY child.key"#,
        )
        .bind(&key)
        .bind(inner.iter().map(|s| s.to_string()).collect::<Vec<String>>())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("child_key"), r.get("child_value")))
            .collect())
    }
}
