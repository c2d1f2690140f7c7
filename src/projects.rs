// src/projects.rs

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::models::Project;
use crate::store::{paths, transaction, Mutation, Store};
use crate::{validation, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializedProject {
    pub project_name: String,
    /// The project was already there before this call.
    pub exists: bool,
    pub initialized: bool,
}

/// Creates the project node, or only refreshes `updatedAt` when it is already there.
///
/// Safe to call repeatedly: existing products, purchases and timestamps are never touched.
pub async fn initialize_project(state: &AppState, name: &str) -> Result<InitializedProject, ApiError> {
    let name = validation::project_name(name)?;
    let path = paths::project(name);

    let mut existed = false;
    let outcome = transaction(state.store.as_ref(), &path, state.tx_options(), |current| {
        let now = json!(Utc::now());
        match current {
            Some(Value::Object(existing)) => {
                existed = true;
                let mut next = existing.clone();
                next.insert("updatedAt".to_string(), now);
                Ok(Mutation::Set(Value::Object(next)))
            }
            _ => {
                existed = false;
                Ok(Mutation::Set(json!({
                    "name": name,
                    "products": false,
                    "purchases": false,
                    "subscriptions": false,
                    "users": false,
                    "createdAt": now,
                    "updatedAt": now,
                })))
            }
        }
    })
    .await?;

    log::info!(
        "project initialized name={name} existed={existed} attempts={}",
        outcome.attempts
    );

    Ok(InitializedProject {
        project_name: name.to_string(),
        exists: existed,
        initialized: true,
    })
}

/// Loads the project header. Fails with `PROJECT_NOT_FOUND` when absent.
pub async fn require_project(store: &dyn Store, name: &str) -> Result<Project, ApiError> {
    let name = validation::project_name(name)?;
    let path = paths::project(name);
    let snapshot = store.get(&path).await?;
    let Some(node) = snapshot.value else {
        return Err(ApiError::project_not_found());
    };

    let header = |field: &str| node.get(field).cloned().unwrap_or(Value::Null);
    let project = serde_json::from_value::<Project>(json!({
        "name": name,
        "createdAt": header("createdAt"),
        "updatedAt": header("updatedAt"),
    }))
    .map_err(|e| ApiError::internal("DATABASE_ERROR", format!("corrupt project node {path}: {e}")))?;
    Ok(project)
}
