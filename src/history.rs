// src/history.rs
//
// Per-user purchase history. Non-authoritative: failures are logged and swallowed.

use std::sync::Arc;

use chrono::Utc;

use crate::models::{HistoryEntry, UserHistory};
use crate::store::{self, paths, Store, StoreResult, TxOptions};

/// Appends `entry`, keeping at most `limit` most recent entries. `totalPurchases` keeps
/// counting past the limit.
pub async fn append(
    store: &dyn Store,
    project: &str,
    user_id: &str,
    entry: HistoryEntry,
    limit: usize,
    options: TxOptions,
) -> StoreResult<()> {
    store::update::<UserHistory, _>(store, &paths::user(project, user_id), options, |current| {
        let now = Utc::now();
        let mut history = current.unwrap_or_else(|| UserHistory {
            user_id: user_id.to_string(),
            purchase_history: Vec::new(),
            total_purchases: 0,
            created_at: now,
            updated_at: now,
        });
        history.purchase_history.push(entry.clone());
        if history.purchase_history.len() > limit {
            let overflow = history.purchase_history.len() - limit;
            history.purchase_history.drain(..overflow);
        }
        history.total_purchases += 1;
        history.updated_at = now;
        Some(history)
    })
    .await?;
    Ok(())
}

/// Fire-and-forget [`append`].
pub fn spawn_append(
    store: Arc<dyn Store>,
    project: String,
    user_id: String,
    entry: HistoryEntry,
    limit: usize,
    options: TxOptions,
) {
    tokio::spawn(async move {
        let transaction_id = entry.transaction_id.clone();
        if let Err(e) = append(store.as_ref(), &project, &user_id, entry, limit, options).await {
            log::warn!(
                "user history update failed project={project} user_id={user_id} transaction_id={transaction_id}: {e}"
            );
        }
    });
}

pub async fn get(store: &dyn Store, project: &str, user_id: &str) -> StoreResult<Option<UserHistory>> {
    store.get(&paths::user(project, user_id)).await?.decode()
}
