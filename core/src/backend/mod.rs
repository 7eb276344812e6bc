//! Backend-facing operations consumed by the dispatcher and the route loader.
//!
//! Every implementation raises non-success statuses it cannot deliver as a
//! [`TransportError::Status`], which is the failure class the auth-recovery
//! interceptor inspects.

mod http;
mod mock;

pub use http::HttpBackend;
pub use mock::{MockBackend, MockReply};

use crate::message::{AssistantChatMessage, AssistantDescriptor, FileAttachment};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

/// Raw body of a streamed response, read chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("backend responded with {status}")]
    Status { status: StatusCode, body: String },
    #[error("request aborted")]
    Aborted,
    #[error("http transport failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Status carried by an HTTP response failure, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn status_only(status: StatusCode) -> Self {
        Self::Status {
            status,
            body: String::new(),
        }
    }
}

/// Wait for the first non-empty chunk of `body`.
///
/// Returns `None` when the body ends without carrying any bytes; otherwise the
/// chunk is put back in front of the remaining stream.
pub async fn first_chunk(
    mut body: ByteStream,
    cancel: &CancellationToken,
) -> Result<Option<ByteStream>, TransportError> {
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Aborted),
            chunk = body.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) if bytes.is_empty() => continue,
            Some(Ok(bytes)) => {
                let restored: ByteStream = stream::once(async move { Ok(bytes) })
                    .chain(body)
                    .boxed();
                return Ok(Some(restored));
            }
            Some(Err(err)) => return Err(err),
            None => return Ok(None),
        }
    }
}

/// A response whose status was not raised by the transport.
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Option<ByteStream>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: Option<ByteStream>) -> Self {
        Self { status, body }
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_plain(
        &self,
        message: &AssistantChatMessage,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError>;

    async fn send_multipart(
        &self,
        message: &AssistantChatMessage,
        files: &[FileAttachment],
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}

#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    async fn list_assistants(&self) -> Result<Vec<AssistantDescriptor>, TransportError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for std::sync::Arc<T> {
    async fn send_plain(
        &self,
        message: &AssistantChatMessage,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        (**self).send_plain(message, cancel).await
    }

    async fn send_multipart(
        &self,
        message: &AssistantChatMessage,
        files: &[FileAttachment],
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        (**self).send_multipart(message, files, cancel).await
    }
}

#[async_trait]
impl<T: DirectoryBackend + ?Sized> DirectoryBackend for std::sync::Arc<T> {
    async fn list_assistants(&self) -> Result<Vec<AssistantDescriptor>, TransportError> {
        (**self).list_assistants().await
    }
}
