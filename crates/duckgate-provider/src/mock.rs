use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{ChatProvider, ChunkStream, ProviderError};

/// A scripted provider for tests: yields a fixed list of chunks, optionally
/// failing part-way or before the first chunk.
#[derive(Clone, Default)]
pub struct MockProvider {
    chunks: Vec<String>,
    fail_after: Option<(usize, String)>,
    fail_on_open: Option<String>,
    delay: Option<Duration>,
    /// Chunks handed to consumers so far, across all streams.
    emitted: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockProvider {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Fail with `message` after `n` chunks have been yielded.
    pub fn failing_after(mut self, n: usize, message: &str) -> Self {
        self.fail_after = Some((n, message.to_string()));
        self
    }

    /// Fail before producing any stream.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_on_open: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Sleep before each chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    /// `(prompt, model)` pairs seen by `stream`/`complete`.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, prompt: &str, model: &str) -> Result<ChunkStream, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((prompt.to_string(), model.to_string()));
        }
        if let Some(message) = &self.fail_on_open {
            return Err(ProviderError::Upstream(message.clone()));
        }

        let chunks = self.chunks.clone();
        let fail_after = self.fail_after.clone();
        let delay = self.delay;
        let emitted = self.emitted.clone();

        let limit = fail_after.as_ref().map_or(usize::MAX, |(n, _)| *n);

        Ok(Box::pin(async_stream::stream! {
            for chunk in chunks.into_iter().take(limit) {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                emitted.fetch_add(1, Ordering::SeqCst);
                yield Ok(chunk);
            }
            if let Some((_, message)) = fail_after {
                yield Err(ProviderError::Upstream(message));
            }
        }))
    }
}
