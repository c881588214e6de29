use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Level;

use duckgate_core::api_key::{mask_key, CreateApiKey};
use duckgate_core::{log_operation, ApiKey, Operation};

use super::AppState;
use crate::error::ApiError;

const KEY_NOT_FOUND: &str = "API key not found";

#[derive(Serialize)]
struct ApiKeyList {
    api_keys: Vec<ApiKey>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api-keys", get(list_api_keys).post(create_api_key))
        .route("/api-keys/", get(list_api_keys).post(create_api_key))
        .route("/api-keys/{key}", delete(delete_api_key))
}

async fn list_api_keys(State(state): State<AppState>) -> Result<Json<ApiKeyList>, ApiError> {
    log_operation(Level::INFO, Operation::RequestReceived, "list API keys");
    let api_keys = state.keys.list_all().await?;
    log_operation(
        Level::INFO,
        Operation::RequestProcessed,
        format!("returned {} API keys", api_keys.len()),
    );
    Ok(Json(ApiKeyList { api_keys }))
}

async fn create_api_key(
    State(state): State<AppState>,
    payload: Result<Json<CreateApiKey>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiKey>), ApiError> {
    let Json(input) = payload?;
    log_operation(Level::INFO, Operation::RequestReceived, "create API key");
    let created = state.keys.create(input.description.as_deref()).await?;
    log_operation(
        Level::INFO,
        Operation::RequestProcessed,
        format!("API key created: {}", mask_key(&created.key)),
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_api_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    log_operation(
        Level::INFO,
        Operation::RequestReceived,
        format!("delete API key {}", mask_key(&key)),
    );
    if !state.keys.delete(&key).await? {
        return Err(ApiError::NotFound(KEY_NOT_FOUND));
    }
    Ok(Json(json!({ "detail": "API key deleted" })))
}
