use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use crate::ProviderError;

/// Splits an incoming byte stream into complete lines. Partial lines are
/// held until their terminating `\n` arrives.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamEvent {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    Chunk(String),
    Done,
    Skip,
}

/// Interpret one SSE line from the chat endpoint.
pub(crate) fn parse_line(line: &str) -> Result<Frame, ProviderError> {
    let Some(payload) = line.strip_prefix("data:") else {
        // comments, `event:` lines, blank separators
        return Ok(Frame::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(Frame::Skip);
    }
    if payload == "[DONE]" {
        return Ok(Frame::Done);
    }
    let event: UpstreamEvent = serde_json::from_str(payload)
        .map_err(|e| ProviderError::Malformed(format!("{e}: {payload}")))?;
    if event.action.as_deref() == Some("error") {
        let kind = event.kind.unwrap_or_else(|| "unknown".into());
        let detail = match event.status {
            Some(status) => format!("{kind} (status {status})"),
            None => kind,
        };
        return Err(ProviderError::Upstream(detail));
    }
    match event.message {
        Some(message) if !message.is_empty() => Ok(Frame::Chunk(message)),
        _ => Ok(Frame::Skip),
    }
}

/// Turn an upstream SSE body into text chunks. Ends at `[DONE]` or when the
/// body ends, and stops after the first error.
pub(crate) fn decode_chunks<S>(body: S) -> impl Stream<Item = Result<String, ProviderError>> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut lines = LineBuffer::default();
        let mut done = false;

        while !done {
            let Some(bytes) = body.next().await else {
                break;
            };
            let bytes = bytes?;
            for line in lines.push(&bytes) {
                match parse_line(&line)? {
                    Frame::Chunk(text) => yield text,
                    Frame::Done => {
                        done = true;
                        break;
                    }
                    Frame::Skip => {}
                }
            }
        }

        if !done {
            if let Some(line) = lines.finish() {
                if let Frame::Chunk(text) = parse_line(&line)? {
                    yield text;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"mess").is_empty());
        let lines = buf.push(b"age\":\"Hi\"}\r\n\ndata: [DO");
        assert_eq!(lines, vec![r#"data: {"message":"Hi"}"#.to_string(), String::new()]);
        assert_eq!(buf.finish().as_deref(), Some("data: [DO"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn parse_message_line() {
        let frame = parse_line(r#"data: {"role":"assistant","message":"He","action":"success"}"#)
            .unwrap();
        assert_eq!(frame, Frame::Chunk("He".into()));
    }

    #[test]
    fn parse_done_and_noise() {
        assert_eq!(parse_line("data: [DONE]").unwrap(), Frame::Done);
        assert_eq!(parse_line("").unwrap(), Frame::Skip);
        assert_eq!(parse_line(": keep-alive").unwrap(), Frame::Skip);
        assert_eq!(parse_line("event: message").unwrap(), Frame::Skip);
        assert_eq!(parse_line(r#"data: {"action":"success"}"#).unwrap(), Frame::Skip);
    }

    #[test]
    fn parse_error_event() {
        let err = parse_line(r#"data: {"action":"error","status":429,"type":"ERR_CONVERSATION_LIMIT"}"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "upstream error: ERR_CONVERSATION_LIMIT (status 429)"
        );
    }

    #[test]
    fn parse_garbage_is_malformed() {
        let err = parse_line("data: {not json").unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
