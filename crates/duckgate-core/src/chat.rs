use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const COMPLETION_OBJECT: &str = "chat.completion";
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const FINISH_STOP: &str = "stop";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Inbound OpenAI-style chat completion request.
///
/// `max_tokens` and `temperature` are accepted for client compatibility; the
/// upstream provider has no knobs for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    /// The text forwarded upstream: the content of the last message.
    /// Earlier history is accepted but not sent.
    pub fn prompt(&self) -> Result<&str, CoreError> {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .ok_or(CoreError::EmptyMessages)
    }

    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    pub finish_reason: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    pub fn new(model: &str, content: String) -> Self {
        Self {
            id: completion_id(),
            object: COMPLETION_OBJECT.into(),
            created: Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                message: ChatMessage::assistant(content),
                finish_reason: FINISH_STOP.into(),
                index: 0,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    pub fn new(id: &str, model: &str, content: String) -> Self {
        Self {
            id: id.to_string(),
            object: CHUNK_OBJECT.into(),
            created: Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                delta: Delta { content },
            }],
        }
    }
}

/// Frame emitted in place of further chunks when the provider fails mid-stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    pub error: bool,
    pub message: String,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}
