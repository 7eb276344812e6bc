//! Incremental decoding of a streamed chat reply.
//!
//! The body is newline-delimited JSON. Every record carries a `type` tag:
//!
//! ```text
//! {"type":"text","text":"Hello"}
//! {"type":"source","title":"Handbook","url":"https://example.com/handbook"}
//! ```
//!
//! `\r\n` endings and blank lines are tolerated and a final record without a
//! trailing newline is accepted at end of stream.

use crate::backend::{ByteStream, TransportError};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Text { text: String },
    Source(Citation),
}

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("malformed event on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("stream cancelled")]
    Cancelled,
    #[error("stream interrupted: {0}")]
    Transport(#[from] TransportError),
}

/// Everything a finished stream delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<Citation>,
}

impl ChatReply {
    pub fn push(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Text { text } => self.text.push_str(&text),
            ChatEvent::Source(citation) => self.sources.push(citation),
        }
    }
}

/// Single-pass reader over a reply body.
///
/// Once an error has been returned, or the body is exhausted, every further
/// call yields `None`.
pub struct EventStream {
    body: Option<ByteStream>,
    cancel: CancellationToken,
    buffer: Vec<u8>,
    line: usize,
    finished: bool,
}

impl EventStream {
    pub fn new(body: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            body: Some(body),
            cancel,
            buffer: Vec::new(),
            line: 0,
            finished: false,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn next_event(&mut self) -> Option<Result<ChatEvent, StreamError>> {
        loop {
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                debug!(line = self.line, "reply stream cancelled");
                return Some(self.fail(StreamError::Cancelled));
            }

            if let Some(record) = self.take_line() {
                match self.decode(&record) {
                    Ok(Some(event)) => return Some(Ok(event)),
                    Ok(None) => continue,
                    Err(err) => return Some(self.fail(err)),
                }
            }

            let Some(body) = self.body.as_mut() else {
                self.finished = true;
                if self.buffer.is_empty() {
                    return None;
                }
                let record = std::mem::take(&mut self.buffer);
                return match self.decode(&record) {
                    Ok(Some(event)) => Some(Ok(event)),
                    Ok(None) => None,
                    Err(err) => Some(self.fail(err)),
                };
            };

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => continue,
                chunk = body.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(&bytes),
                Some(Err(err)) => return Some(self.fail(err.into())),
                None => self.body = None,
            }
        }
    }

    /// Drain the remaining events into one reply.
    pub async fn collect_reply(mut self) -> Result<ChatReply, StreamError> {
        let mut reply = ChatReply::default();
        while let Some(event) = self.next_event().await {
            reply.push(event?);
        }
        Ok(reply)
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<ChatEvent, StreamError>> {
        stream::unfold(self, |mut events| async move {
            events.next_event().await.map(|item| (item, events))
        })
        .boxed()
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let mut record: Vec<u8> = self.buffer.drain(..=end).collect();
        record.pop();
        Some(record)
    }

    fn decode(&mut self, record: &[u8]) -> Result<Option<ChatEvent>, StreamError> {
        self.line += 1;
        let line = self.line;
        let text = std::str::from_utf8(record).map_err(|err| StreamError::Parse {
            line,
            reason: format!("invalid UTF-8: {err}"),
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(text)
            .map(Some)
            .map_err(|err| StreamError::Parse {
                line,
                reason: err.to_string(),
            })
    }

    // Drops the body so the underlying connection is released.
    fn fail(&mut self, err: StreamError) -> Result<ChatEvent, StreamError> {
        if let StreamError::Parse { line, reason } = &err {
            warn!(line, %reason, "malformed reply stream");
        }
        self.finished = true;
        self.body = None;
        self.buffer.clear();
        Err(err)
    }
}
