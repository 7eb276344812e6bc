use super::{ByteStream, ChatBackend, DirectoryBackend, RawResponse, TransportError};
use crate::message::{AssistantChatMessage, AssistantDescriptor, FileAttachment};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Scripted reply for the next call to a [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Deliver the chunks as the response body, then end the stream.
    Stream { status: StatusCode, chunks: Vec<Bytes> },
    /// Deliver the chunks and then keep the body open forever.
    Stalled { chunks: Vec<Bytes> },
    /// Respond with the status and no body at all.
    Empty(StatusCode),
    /// Raise the status as a transport failure.
    Fail(StatusCode),
    /// Never respond; resolves as aborted once the token fires.
    Hang,
}

impl MockReply {
    pub fn ndjson(lines: &[&str]) -> Self {
        let chunks = lines
            .iter()
            .map(|line| Bytes::from(format!("{line}\n")))
            .collect();
        Self::Stream {
            status: StatusCode::OK,
            chunks,
        }
    }
}

/// In-memory backend that replays scripted replies and counts calls.
///
/// When no reply is queued the backend echoes the message back as text events.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    assistants: Mutex<Option<Result<Vec<AssistantDescriptor>, StatusCode>>>,
    plain_calls: AtomicUsize,
    multipart_calls: AtomicUsize,
    directory_calls: AtomicUsize,
    uploaded: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push_reply(reply);
        self
    }

    pub fn with_assistants(self, assistants: Vec<AssistantDescriptor>) -> Self {
        *self.assistants.lock() = Some(Ok(assistants));
        self
    }

    pub fn with_failing_directory(self, status: StatusCode) -> Self {
        *self.assistants.lock() = Some(Err(status));
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    pub fn plain_calls(&self) -> usize {
        self.plain_calls.load(Ordering::SeqCst)
    }

    pub fn multipart_calls(&self) -> usize {
        self.multipart_calls.load(Ordering::SeqCst)
    }

    pub fn directory_calls(&self) -> usize {
        self.directory_calls.load(Ordering::SeqCst)
    }

    /// File names received by multipart calls, in upload order.
    pub fn uploaded_files(&self) -> Vec<String> {
        self.uploaded.lock().clone()
    }

    async fn respond(
        &self,
        message: &AssistantChatMessage,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| echo_reply(message));
        match reply {
            MockReply::Stream { status, chunks } => {
                let body: ByteStream = stream::iter(chunks.into_iter().map(Ok)).boxed();
                Ok(RawResponse::new(status, Some(body)))
            }
            MockReply::Stalled { chunks } => {
                let body: ByteStream = stream::iter(chunks.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed();
                Ok(RawResponse::new(StatusCode::OK, Some(body)))
            }
            MockReply::Empty(status) => Ok(RawResponse::new(status, None)),
            MockReply::Fail(status) => Err(TransportError::status_only(status)),
            MockReply::Hang => {
                cancel.cancelled().await;
                Err(TransportError::Aborted)
            }
        }
    }
}

fn echo_reply(message: &AssistantChatMessage) -> MockReply {
    let mut lines = vec![json!({
        "type": "text",
        "text": format!("[{}] ", message.assistant_name),
    })];
    for word in message.message.split_inclusive(' ') {
        lines.push(json!({"type": "text", "text": word}));
    }
    let chunks = lines
        .into_iter()
        .map(|line| Bytes::from(format!("{line}\n")))
        .collect();
    MockReply::Stream {
        status: StatusCode::OK,
        chunks,
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn send_plain(
        &self,
        message: &AssistantChatMessage,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.plain_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(message, cancel).await
    }

    async fn send_multipart(
        &self,
        message: &AssistantChatMessage,
        files: &[FileAttachment],
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.multipart_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded
            .lock()
            .extend(files.iter().map(|file| file.name().to_owned()));
        self.respond(message, cancel).await
    }
}

#[async_trait]
impl DirectoryBackend for MockBackend {
    async fn list_assistants(&self) -> Result<Vec<AssistantDescriptor>, TransportError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        match self.assistants.lock().clone() {
            Some(Ok(assistants)) => Ok(assistants),
            Some(Err(status)) => Err(TransportError::status_only(status)),
            None => Ok(Vec::new()),
        }
    }
}
