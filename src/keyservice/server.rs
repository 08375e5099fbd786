//! Key manager HTTP API over a [`KeyInventory`].
//!
//! Mirrors the routes a QKD key manager exposes to its SAEs. Issuance and
//! lookups run on the blocking pool because the inventory holds a std mutex
//! and writes its snapshot synchronously.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::api::{ErrorBody, IssueBody, IssueQuery, KeyBatch, KeyEntry, RetrieveBody, StatsBody, KEY_NOT_FOUND};
use crate::inventory::{InventoryError, KeyInventory};

/// Upper bound on `number` for a single issuance request.
pub const MAX_KEYS_PER_REQUEST: usize = 1000;

/// Error answered with a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(e: InventoryError) -> Self {
        let status = match e {
            InventoryError::InvalidCount => StatusCode::BAD_REQUEST,
            InventoryError::KeyNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Runs an inventory call on the blocking pool.
async fn blocking<T, F>(inventory: &Arc<KeyInventory>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&KeyInventory) -> Result<T, InventoryError> + Send + 'static,
{
    let inventory = Arc::clone(inventory);
    tokio::task::spawn_blocking(move || f(&inventory))
        .await
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Worker task failed"))?
        .map_err(ApiError::from)
}

/// Builds the router: `/keys/:slave_id`, `/keys/retrieve/:key_id` and `/stats`.
pub fn router(inventory: Arc<KeyInventory>) -> Router {
    Router::new()
        .route("/keys/:slave_id", get(issue_keys))
        .route("/keys/retrieve/:key_id", get(retrieve_key))
        .route("/stats", get(stats))
        .with_state(inventory)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn issue_keys(
    State(inventory): State<Arc<KeyInventory>>,
    Path(slave_id): Path<String>,
    query: Result<Query<IssueQuery>, QueryRejection>,
) -> Result<Json<IssueBody>, ApiError> {
    let Query(query) = query?;
    let count = query.number;
    if count > MAX_KEYS_PER_REQUEST {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("At most {} keys per request", MAX_KEYS_PER_REQUEST),
        ));
    }

    let issued = blocking(&inventory, move |inv| inv.issue(count)).await?;
    log::info!("Issued {} key(s) to {}", issued.len(), slave_id);

    let mut entries: Vec<KeyEntry> = issued
        .into_iter()
        .map(|k| KeyEntry {
            key: k.material.to_base64(),
            key_id: k.key_id,
        })
        .collect();

    let body = if count == 1 {
        match entries.pop() {
            Some(entry) => IssueBody::One(entry),
            None => return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "No key issued")),
        }
    } else {
        IssueBody::Many(KeyBatch { keys: entries })
    };
    Ok(Json(body))
}

async fn retrieve_key(
    State(inventory): State<Arc<KeyInventory>>,
    Path(key_id): Path<String>,
) -> Result<Json<RetrieveBody>, ApiError> {
    let lookup = key_id.clone();
    match blocking(&inventory, move |inv| inv.retrieve(&lookup)).await {
        Ok(material) => Ok(Json(RetrieveBody::Found(KeyEntry {
            key_id,
            key: material.to_base64(),
        }))),
        // Unknown ids answer 200 with an error body, as key managers do.
        Err(e) if e.status == StatusCode::NOT_FOUND => {
            log::debug!("Retrieve for unknown key {}", key_id);
            Ok(Json(RetrieveBody::Missing(ErrorBody {
                error: KEY_NOT_FOUND.to_string(),
            })))
        }
        Err(e) => Err(e),
    }
}

async fn stats(State(inventory): State<Arc<KeyInventory>>) -> Result<Json<StatsBody>, ApiError> {
    let remaining_keys = blocking(&inventory, |inv| inv.stats()).await?;
    Ok(Json(StatsBody { remaining_keys }))
}
