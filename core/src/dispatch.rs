use crate::auth::{AuthRecovery, WithAuthRecovery};
use crate::backend::{ByteStream, ChatBackend, RawResponse, TransportError};
use crate::message::OutgoingChatMessage;
use crate::stream::EventStream;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("no assistant selected for this message")]
    MissingAssistant,
    #[error("assistant not found")]
    NotFound,
    #[error("assistant backend reported a server error")]
    ServerError,
    #[error("assistant backend responded with unexpected status {status}")]
    Unclassified { status: StatusCode },
    #[error("session expired; sign in again to continue")]
    SessionExpired,
    #[error("message dispatch cancelled")]
    Cancelled,
    #[error("message dispatch failed: {0}")]
    Transport(#[source] TransportError),
}

impl DispatchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryVariant {
    Plain,
    Multipart,
}

impl DeliveryVariant {
    pub fn for_message(message: &OutgoingChatMessage) -> Self {
        if message.has_files() {
            Self::Multipart
        } else {
            Self::Plain
        }
    }
}

/// Map a status outside the deliverable range onto a dispatch failure.
pub fn classify(status: StatusCode) -> DispatchError {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => DispatchError::ServerError,
        StatusCode::NOT_FOUND => DispatchError::NotFound,
        status => DispatchError::Unclassified { status },
    }
}

fn is_deliverable(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Sends one chat message per call and hands back its reply stream.
///
/// Exactly one backend operation runs per call; nothing is retried.
/// Session expiry is only reported once a status is configured, which
/// [`Dispatcher::guarded`] does.
pub struct Dispatcher<B> {
    backend: B,
    expired_status: Option<StatusCode>,
}

impl<B: ChatBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            expired_status: None,
        }
    }

    pub fn with_session_expired_status(mut self, status: StatusCode) -> Self {
        self.expired_status = Some(status);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Send the message and return the raw reply body.
    pub async fn send(
        &self,
        message: &OutgoingChatMessage,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, DispatchError> {
        if message.assistant_name.trim().is_empty() {
            return Err(DispatchError::MissingAssistant);
        }

        let variant = DeliveryVariant::for_message(message);
        let wire = message.to_wire();
        debug!(
            assistant = %message.assistant_name,
            ?variant,
            files = message.files.len(),
            "dispatching chat message"
        );

        let request = async {
            match variant {
                DeliveryVariant::Plain => self.backend.send_plain(&wire, cancel).await,
                DeliveryVariant::Multipart => {
                    self.backend
                        .send_multipart(&wire, &message.files, cancel)
                        .await
                }
            }
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            outcome = request => outcome,
        };

        let result = self.settle(outcome);
        if let Err(err) = &result {
            if !err.is_cancelled() {
                warn!(assistant = %message.assistant_name, error = %err, "chat dispatch failed");
            }
        }
        result
    }

    /// Send the message and decode its reply as chat events, governed by the same token.
    pub async fn dispatch(
        &self,
        message: &OutgoingChatMessage,
        cancel: CancellationToken,
    ) -> Result<EventStream, DispatchError> {
        let body = self.send(message, &cancel).await?;
        Ok(EventStream::new(body, cancel))
    }

    fn settle(
        &self,
        outcome: Result<RawResponse, TransportError>,
    ) -> Result<ByteStream, DispatchError> {
        match outcome {
            Ok(RawResponse { status, body }) => match body {
                Some(body) if is_deliverable(status) => Ok(body),
                _ => Err(classify(status)),
            },
            Err(TransportError::Aborted) => Err(DispatchError::Cancelled),
            Err(err) if self.expired_status.is_some() && err.status() == self.expired_status => {
                Err(DispatchError::SessionExpired)
            }
            Err(TransportError::Status { status, .. }) => Err(classify(status)),
            Err(err) => Err(DispatchError::Transport(err)),
        }
    }
}

impl<B: ChatBackend> Dispatcher<WithAuthRecovery<B>> {
    /// Dispatcher whose backend calls all run under `recovery`.
    pub fn guarded(backend: B, recovery: &AuthRecovery) -> Self {
        Dispatcher::new(recovery.wrap(backend))
            .with_session_expired_status(recovery.expired_status())
    }
}
