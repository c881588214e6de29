pub mod duckchat;
pub mod mock;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

pub use duckchat::{DuckChatConfig, DuckChatProvider};
pub use mock::MockProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream did not issue a session token")]
    MissingToken,

    #[error("malformed upstream event: {0}")]
    Malformed(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Finite, non-restartable sequence of generated text chunks.
///
/// Dropping the stream releases the underlying upstream response.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Opaque text-generation capability behind the chat gateway.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Start generating a reply to `prompt` on `model`.
    async fn stream(&self, prompt: &str, model: &str) -> Result<ChunkStream, ProviderError>;

    /// Generate the whole reply at once.
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let mut chunks = self.stream(prompt, model).await?;
        let mut reply = String::new();
        while let Some(chunk) = chunks.next().await {
            reply.push_str(&chunk?);
        }
        Ok(reply)
    }
}
