//! End-to-end tests against a gateway listening on 127.0.0.1:0.
//!
//! Each test spawns an in-process server over a temp SQLite store and a
//! scripted provider, then drives it with a real HTTP client.

use std::time::Duration;

use duckgate_provider::MockProvider;
use duckgate_server::test_helpers::{
    spawn_test_server, sse_frames, test_app, TestServer, TEST_ADMIN_TOKEN,
};
use serde_json::{json, Value};

async fn server(provider: MockProvider) -> TestServer {
    spawn_test_server(test_app(provider).await).await
}

async fn issue_key(client: &reqwest::Client, base_url: &str) -> String {
    let resp = client
        .post(format!("{base_url}/api-keys/"))
        .bearer_auth(TEST_ADMIN_TOKEN)
        .json(&json!({ "description": "integration" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    created["key"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn key_lifecycle_over_http() {
    let srv = server(MockProvider::new(&["Hello"])).await;
    let client = reqwest::Client::new();
    let key = issue_key(&client, &srv.base_url).await;

    let resp = client
        .post(format!("{}/chat/completions", srv.base_url))
        .bearer_auth(&key)
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "Hello");

    let listed: Value = client
        .get(format!("{}/api-keys/", srv.base_url))
        .bearer_auth(TEST_ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["api_keys"][0]["usage_count"], 1);
    assert!(listed["api_keys"][0]["last_used_at"].is_string());

    let resp = client
        .delete(format!("{}/api-keys/{key}", srv.base_url))
        .bearer_auth(TEST_ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/chat/completions", srv.base_url))
        .bearer_auth(&key)
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn streaming_over_http() {
    let srv = server(MockProvider::new(&["He", "llo"])).await;
    let client = reqwest::Client::new();
    let key = issue_key(&client, &srv.base_url).await;

    let resp = client
        .post(format!("{}/chat/completions", srv.base_url))
        .bearer_auth(&key)
        .json(&json!({
            "model": "llama-3.3-70b",
            "messages": [{ "role": "user", "content": "hi" }],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    let frames = sse_frames(&body);
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0], "[BEGIN]");
    assert!(frames[1].contains("\"He\""));
    assert!(frames[2].contains("\"llo\""));
    assert_eq!(frames[3], "[DONE]");
}

#[tokio::test]
async fn client_disconnect_stops_generation() {
    let chunks = ["tok"; 200];
    let provider = MockProvider::new(&chunks).with_delay(Duration::from_millis(10));
    let srv = server(provider.clone()).await;
    let client = reqwest::Client::new();
    let key = issue_key(&client, &srv.base_url).await;

    let mut resp = client
        .post(format!("{}/chat/completions", srv.base_url))
        .bearer_auth(&key)
        .json(&json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.chunk().await.unwrap().is_some());
    drop(resp);
    drop(client);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let after_disconnect = provider.emitted();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(after_disconnect < chunks.len());
    assert_eq!(provider.emitted(), after_disconnect);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let srv = server(MockProvider::default()).await;
    let resp = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/chat/completions", srv.base_url),
        )
        .header("origin", "https://app.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
