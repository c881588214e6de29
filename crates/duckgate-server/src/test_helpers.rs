use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use duckgate_core::model::{DEFAULT_MODEL, KNOWN_MODELS};
use duckgate_db::KeyStore;
use duckgate_provider::MockProvider;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::routes::{build_router, AppState, InnerAppState};

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// A router-ready state over a throwaway SQLite file and a scripted provider.
pub struct TestApp {
    pub state: AppState,
    pub provider: MockProvider,
    _dir: Option<TempDir>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

pub fn test_config(sqlite_db_path: PathBuf, ignore_api_keys: bool) -> Config {
    Config {
        debug: false,
        ignore_api_keys,
        admin_token: TEST_ADMIN_TOKEN.into(),
        database_url: None,
        sqlite_db_path,
        default_model: DEFAULT_MODEL.into(),
        available_models: KNOWN_MODELS.iter().map(|m| m.to_string()).collect(),
        log_level: "info".into(),
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec!["*".into()],
    }
}

/// Key checks enforced, keys stored in a temp SQLite file.
pub async fn test_app(provider: MockProvider) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().join("api_keys.db"), false);
    let keys = KeyStore::open(&config.db_config(), false).unwrap();
    keys.initialize().await.unwrap();
    TestApp {
        state: InnerAppState::new(config, keys, Arc::new(provider.clone())),
        provider,
        _dir: Some(dir),
    }
}

/// Key checks bypassed; no database is opened.
pub async fn test_app_bypass(provider: MockProvider) -> TestApp {
    let config = test_config(PathBuf::from("unused.db"), true);
    let keys = KeyStore::bypass();
    keys.initialize().await.unwrap();
    TestApp {
        state: InnerAppState::new(config, keys, Arc::new(provider.clone())),
        provider,
        _dir: None,
    }
}

pub fn admin_request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TEST_ADMIN_TOKEN}"));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn chat_request(api_key: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat/completions")
        .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub async fn body_text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_str(&body_text(resp).await).unwrap()
}

/// `data:` payloads of an event-stream body, in order.
pub fn sse_frames(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|event| {
            let data: Vec<&str> = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            (!data.is_empty()).then(|| data.join("\n"))
        })
        .collect()
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub app: TestApp,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn the gateway on a random local port.
pub async fn spawn_test_server(app: TestApp) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        app,
        _handle: handle,
    }
}
