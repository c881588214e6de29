use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures_util::StreamExt;
use tracing::Level;

use duckgate_core::chat::ChatCompletionRequest;
use duckgate_core::{log_operation, Operation};

use super::AppState;
use crate::error::ApiError;
use crate::gateway::{Frame, BEGIN_SENTINEL, DONE_SENTINEL};

pub fn routes() -> Router<AppState> {
    Router::new().route("/chat/completions", post(chat_completions))
}

async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let model = state.gateway.models().resolve(request.model.as_deref());
    log_operation(
        Level::INFO,
        Operation::ChatCompletion,
        format!("model {model}, stream={}", request.is_stream()),
    );

    if request.is_stream() {
        let frames = state.gateway.stream(&request)?;
        let events = frames.map(into_event);
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let response = state.gateway.complete(&request).await?;
    Ok(Json(response).into_response())
}

fn into_event(frame: Frame) -> Result<Event, axum::Error> {
    match frame {
        Frame::Begin => Ok(Event::default().data(BEGIN_SENTINEL)),
        Frame::Chunk(chunk) => Event::default().json_data(chunk),
        Frame::Error(error) => Event::default().json_data(error),
        Frame::Done => Ok(Event::default().data(DONE_SENTINEL)),
    }
}
