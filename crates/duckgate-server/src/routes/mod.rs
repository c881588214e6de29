pub mod api_keys;
pub mod chat;
pub mod health;

use std::sync::Arc;

use axum::{http::HeaderValue, middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use duckgate_db::KeyStore;
use duckgate_provider::ChatProvider;

use crate::auth::{require_admin, require_api_key};
use crate::config::Config;
use crate::error::{handle_panic, ApiError};
use crate::gateway::Gateway;

pub struct InnerAppState {
    pub config: Arc<Config>,
    pub keys: KeyStore,
    pub gateway: Gateway,
}

impl InnerAppState {
    pub fn new(config: Config, keys: KeyStore, provider: Arc<dyn ChatProvider>) -> AppState {
        let gateway = Gateway::new(provider, config.model_catalog());
        Arc::new(Self {
            config: Arc::new(config),
            keys,
            gateway,
        })
    }
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new().merge(health::routes());

    let admin = Router::new()
        .merge(api_keys::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let chat = Router::new()
        .merge(chat::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let cors = cors_layer(&state.config.cors_origins);

    public
        .merge(admin)
        .merge(chat)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method Not Allowed")
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}
