//! Client for the DuckDuckGo AI chat endpoint.
//!
//! A conversation is two requests: `GET /duckchat/v1/status` with
//! `x-vqd-accept: 1` issues a session token in the `x-vqd-4` response
//! header, then `POST /duckchat/v1/chat` carrying that token returns the
//! reply as server-sent events.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::sse::decode_chunks;
use crate::{ChatProvider, ChunkStream, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://duckduckgo.com";
const VQD_HEADER: &str = "x-vqd-4";
const VQD_ACCEPT_HEADER: &str = "x-vqd-accept";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone)]
pub struct DuckChatConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for DuckChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [UpstreamMessage<'a>; 1],
}

#[derive(Serialize)]
struct UpstreamMessage<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct DuckChatProvider {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl DuckChatProvider {
    pub fn new(config: DuckChatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent,
        })
    }

    async fn fetch_token(&self) -> Result<String, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/duckchat/v1/status", self.base_url))
            .header(VQD_ACCEPT_HEADER, "1")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.headers()
            .get(VQD_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::MissingToken)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatProvider for DuckChatProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn stream(&self, prompt: &str, model: &str) -> Result<ChunkStream, ProviderError> {
        let token = self.fetch_token().await?;
        debug!("opened duckchat session for model {model}");

        let body = ChatBody {
            model,
            messages: [UpstreamMessage {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .client
            .post(format!("{}/duckchat/v1/chat", self.base_url))
            .header(VQD_HEADER, token)
            .header(ACCEPT, "text/event-stream")
            .header(USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(Box::pin(decode_chunks(resp.bytes_stream())))
    }
}
