//! Chat gateway: turns inbound completion requests into provider calls.
//!
//! Buffered requests return one `ChatCompletionResponse`. Streamed requests
//! produce a sequence of [`Frame`]s that always opens with `Begin` and closes
//! with `Done`, with one `Chunk` per provider chunk in between. A provider
//! failure, whether while opening or mid-stream, becomes a single `Error`
//! frame before `Done`.

use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use tracing::Level;

use duckgate_core::chat::{
    completion_id, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, StreamError,
};
use duckgate_core::{log_operation, ModelCatalog, Operation};
use duckgate_provider::ChatProvider;

use crate::error::ApiError;

pub const BEGIN_SENTINEL: &str = "[BEGIN]";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Begin,
    Chunk(ChatCompletionChunk),
    Error(StreamError),
    Done,
}

#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn ChatProvider>,
    models: ModelCatalog,
}

impl Gateway {
    pub fn new(provider: Arc<dyn ChatProvider>, models: ModelCatalog) -> Self {
        Self { provider, models }
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiError> {
        let prompt = request.prompt()?;
        let model = self.models.resolve(request.model.as_deref());
        let started = Instant::now();

        let reply = self.provider.complete(prompt, model).await.map_err(|e| {
            log_operation(
                Level::ERROR,
                Operation::Error,
                format!("{} generation failed: {e}", self.provider.name()),
            );
            ApiError::Generation(e)
        })?;

        log_operation(
            Level::INFO,
            Operation::RequestProcessed,
            format!(
                "generation finished, {} chars in {:.2}s",
                reply.chars().count(),
                started.elapsed().as_secs_f64()
            ),
        );
        Ok(ChatCompletionResponse::new(model, reply))
    }

    /// Validate the request, then hand back a lazy frame stream. Nothing is
    /// sent upstream until the stream is first polled, and dropping it stops
    /// the provider.
    pub fn stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<impl Stream<Item = Frame> + Send + 'static, ApiError> {
        let prompt = request.prompt()?.to_string();
        let model = self.models.resolve(request.model.as_deref()).to_string();
        let provider = self.provider.clone();

        Ok(async_stream::stream! {
            let id = completion_id();
            let mut stats = StreamStats::new(&model);
            yield Frame::Begin;

            match provider.stream(&prompt, &model).await {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(text) => {
                                stats.chunks += 1;
                                yield Frame::Chunk(ChatCompletionChunk::new(&id, &model, text));
                            }
                            Err(e) => {
                                stats.fail(&e);
                                yield Frame::Error(StreamError::new(e.to_string()));
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    stats.fail(&e);
                    yield Frame::Error(StreamError::new(e.to_string()));
                }
            }

            yield Frame::Done;
            stats.finished = true;
        })
    }
}

/// Chunk count and wall time for one stream, logged when it is dropped.
struct StreamStats {
    model: String,
    started: Instant,
    chunks: usize,
    finished: bool,
}

impl StreamStats {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            started: Instant::now(),
            chunks: 0,
            finished: false,
        }
    }

    fn fail(&self, e: &dyn std::fmt::Display) {
        log_operation(
            Level::ERROR,
            Operation::Error,
            format!("stream on {} failed after {} chunks: {e}", self.model, self.chunks),
        );
    }
}

impl Drop for StreamStats {
    fn drop(&mut self) {
        let outcome = if self.finished { "finished" } else { "cancelled" };
        log_operation(
            Level::INFO,
            Operation::RequestProcessed,
            format!(
                "stream {outcome}, {} chunks in {:.2}s",
                self.chunks,
                self.started.elapsed().as_secs_f64()
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use duckgate_core::chat::ChatMessage;
    use duckgate_provider::MockProvider;

    use super::*;

    fn request(model: Option<&str>, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.map(str::to_string),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: "be brief".into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: "hi".into(),
                },
            ],
            stream: Some(stream),
            max_tokens: None,
            temperature: None,
        }
    }

    fn gateway(provider: MockProvider) -> Gateway {
        Gateway::new(Arc::new(provider), ModelCatalog::default())
    }

    fn chunk_text(frame: &Frame) -> &str {
        match frame {
            Frame::Chunk(chunk) => &chunk.choices[0].delta.content,
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buffered_reply_forwards_last_message() {
        let provider = MockProvider::new(&["Hel", "lo"]);
        let gw = gateway(provider.clone());
        let resp = gw.complete(&request(Some("gpt-4o-mini"), false)).await.unwrap();
        assert_eq!(resp.model, "gpt-4o-mini");
        assert_eq!(resp.choices[0].message.content, "Hello");
        assert_eq!(provider.calls(), vec![("hi".to_string(), "gpt-4o-mini".to_string())]);
    }

    #[tokio::test]
    async fn buffered_failure_is_generation_error() {
        let gw = gateway(MockProvider::failing("offline"));
        let err = gw.complete(&request(None, false)).await.unwrap_err();
        assert!(matches!(err, ApiError::Generation(_)));
    }

    #[tokio::test]
    async fn stream_frames_in_order() {
        let gw = gateway(MockProvider::new(&["He", "llo"]));
        let frames: Vec<Frame> = gw
            .stream(&request(Some("llama-3.3-70b"), true))
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], Frame::Begin);
        assert_eq!(chunk_text(&frames[1]), "He");
        assert_eq!(chunk_text(&frames[2]), "llo");
        assert_eq!(frames[3], Frame::Done);
    }

    #[tokio::test]
    async fn chunks_share_one_id() {
        let gw = gateway(MockProvider::new(&["a", "b", "c"]));
        let frames: Vec<Frame> = gw.stream(&request(None, true)).unwrap().collect().await;
        let ids: Vec<&str> = frames
            .iter()
            .filter_map(|f| match f {
                Frame::Chunk(c) => Some(c.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert!(ids[0].starts_with("chatcmpl-"));
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_with_error_then_done() {
        let gw = gateway(MockProvider::new(&["a", "b", "c"]).failing_after(1, "rate limited"));
        let frames: Vec<Frame> = gw.stream(&request(None, true)).unwrap().collect().await;
        assert_eq!(frames.len(), 4);
        assert_eq!(chunk_text(&frames[1]), "a");
        assert_eq!(
            frames[2],
            Frame::Error(StreamError::new("upstream error: rate limited"))
        );
        assert_eq!(frames[3], Frame::Done);
    }

    #[tokio::test]
    async fn open_failure_still_brackets_stream() {
        let gw = gateway(MockProvider::failing("offline"));
        let frames: Vec<Frame> = gw.stream(&request(None, true)).unwrap().collect().await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], Frame::Begin);
        assert!(matches!(frames[1], Frame::Error(_)));
        assert_eq!(frames[2], Frame::Done);
    }

    #[tokio::test]
    async fn unknown_model_streams_on_default() {
        let provider = MockProvider::new(&["x"]);
        let gw = gateway(provider.clone());
        let frames: Vec<Frame> = gw
            .stream(&request(Some("not-a-real-model"), true))
            .unwrap()
            .collect()
            .await;
        match &frames[1] {
            Frame::Chunk(chunk) => assert_eq!(chunk.model, "llama-3.3-70b"),
            other => panic!("expected chunk, got {other:?}"),
        }
        assert_eq!(provider.calls()[0].1, "llama-3.3-70b");
    }

    #[tokio::test]
    async fn empty_messages_rejected_before_provider() {
        let provider = MockProvider::new(&["x"]);
        let gw = gateway(provider.clone());
        let mut req = request(None, true);
        req.messages.clear();
        assert!(matches!(gw.stream(&req), Err(ApiError::InvalidRequest(_))));
        assert!(matches!(
            gw.complete(&req).await,
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn dropping_stream_stops_provider() {
        let chunks = ["t"; 50];
        let provider = MockProvider::new(&chunks).with_delay(Duration::from_millis(5));
        let gw = gateway(provider.clone());

        let mut frames = Box::pin(gw.stream(&request(None, true)).unwrap());
        assert_eq!(frames.next().await, Some(Frame::Begin));
        assert!(matches!(frames.next().await, Some(Frame::Chunk(_))));
        assert!(matches!(frames.next().await, Some(Frame::Chunk(_))));
        drop(frames);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.emitted(), 2);
    }
}
